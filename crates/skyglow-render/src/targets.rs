//! Viewport-sized accumulation targets and single-pixel readback.
//!
//! The luminance target accumulates XYZW across all passes of a frame and
//! feeds the tonemap. Radiance targets exist per wavelength set only while
//! spectral capture is on; otherwise every pass writes its second output
//! into one shared sink texture, which keeps all scattering pipelines on a
//! single dual-target layout.

use crate::error::RenderError;
use crate::textures::{create_render_target, LoadedTexture};

const PIXEL_BYTES: u64 = 16;

pub struct FrameTargets {
    pub width: u32,
    pub height: u32,
    pub luminance: LoadedTexture,
    /// One per wavelength set when capturing, else a single sink.
    radiance: Vec<LoadedTexture>,
    radiance_capture: bool,
    pub view_direction: LoadedTexture,
    staging: wgpu::Buffer,
}

impl FrameTargets {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        wavelength_set_count: usize,
        radiance_capture: bool,
    ) -> Result<Self, RenderError> {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let luminance = create_render_target(device, "frame-luminance", size)?;
        let radiance_count = if radiance_capture {
            wavelength_set_count
        } else {
            1
        };
        let mut radiance = Vec::with_capacity(radiance_count);
        for set in 0..radiance_count {
            radiance.push(create_render_target(
                device,
                &format!("frame-radiance-{set}"),
                size,
            )?);
        }
        let view_direction = create_render_target(device, "frame-view-direction", size)?;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixel-staging"),
            size: PIXEL_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self {
            width,
            height,
            luminance,
            radiance,
            radiance_capture,
            view_direction,
            staging,
        })
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        *self = Self::new(
            device,
            width,
            height,
            self.radiance.len(),
            self.radiance_capture,
        )?;
        Ok(())
    }

    pub fn radiance_capture(&self) -> bool {
        self.radiance_capture
    }

    /// Second color attachment for an accumulation pass: the per-set target
    /// while capturing, the shared sink otherwise.
    pub fn radiance_view(&self, wl_set: usize) -> &wgpu::TextureView {
        if self.radiance_capture {
            &self.radiance[wl_set].view
        } else {
            &self.radiance[0].view
        }
    }

    pub fn radiance_texture(&self, wl_set: usize) -> &wgpu::Texture {
        if self.radiance_capture {
            &self.radiance[wl_set].texture
        } else {
            &self.radiance[0].texture
        }
    }

    /// Blocking read of one RGBA32F texel. Copies through the persistent
    /// staging buffer and waits for the map; callers are interactive probes,
    /// not the frame loop. Coordinates outside the frame are an error, not
    /// a validation failure on the copy.
    pub fn read_pixel(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        x: u32,
        y: u32,
    ) -> Result<[f32; 4], RenderError> {
        if !probe_in_bounds(x, y, self.width, self.height) {
            return Err(RenderError::ReadbackFailed {
                context: format!(
                    "probe of pixel ({x}, {y}) outside the {}x{} frame",
                    self.width, self.height
                ),
            });
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pixel-readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: None,
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {
                let pixel = {
                    let data = slice.get_mapped_range();
                    let values: &[f32] = bytemuck::cast_slice(&data);
                    [values[0], values[1], values[2], values[3]]
                };
                self.staging.unmap();
                Ok(pixel)
            }
            _ => Err(RenderError::ReadbackFailed {
                context: "pixel readback".to_string(),
            }),
        }
    }
}

fn probe_in_bounds(x: u32, y: u32, width: u32, height: u32) -> bool {
    x < width && y < height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_bounds() {
        assert!(probe_in_bounds(0, 0, 8, 8));
        assert!(probe_in_bounds(7, 7, 8, 8));
        assert!(!probe_in_bounds(8, 7, 8, 8));
        assert!(!probe_in_bounds(7, 8, 8, 8));
        assert!(!probe_in_bounds(0, 0, 0, 0));
    }
}
