//! Lookup-table textures and render-target textures.
//!
//! Radiance tables arrive as raw little-endian f32 files (see
//! `skyglow_tables`); 2D tables upload whole, 4D tables upload as a
//! two-layer 3D texture bracketing the camera altitude. Each 4D texture
//! remembers the altitude range its layers cover so a camera move only
//! re-reads files whose bracket no longer contains the altitude.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use skyglow_core::constants::BAYER_PATTERN_8X8;
use skyglow_core::{AtmosphereParameters, PhaseFunctionKind};
use skyglow_tables::{load_table_2d, load_table_4d, AltitudeSlice, Table2d, Table4d};

use crate::catalog::LUMINANCE_FORMAT;
use crate::error::RenderError;

const BYTES_PER_TEXEL: u32 = 16;

pub struct LoadedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// A 4D table resident as a two-layer 3D texture, plus the altitude bracket
/// those layers cover and the file to re-read when the bracket is left.
pub struct ScatteringTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub slice: AltitudeSlice,
    path: PathBuf,
}

impl ScatteringTexture {
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        altitude_coord: f64,
    ) -> Result<Self, RenderError> {
        let table = load_table_4d(path, altitude_coord)?;
        let label = path.display().to_string();
        let loaded = upload_table_4d(device, queue, &label, &table)?;
        Ok(Self {
            texture: loaded.texture,
            view: loaded.view,
            slice: table.slice,
            path: path.to_path_buf(),
        })
    }

    /// Re-read and re-upload only if `altitude_coord` left the resident
    /// bracket. Returns whether a reload happened.
    pub fn reload_if_needed(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        altitude_coord: f64,
    ) -> Result<bool, RenderError> {
        if self.slice.contains(altitude_coord) {
            return Ok(false);
        }
        let reloaded = Self::load(device, queue, &self.path, altitude_coord)?;
        *self = reloaded;
        Ok(true)
    }
}

/// How a scatterer's single-scattering table is resident, mirroring the
/// shader-variant axes: chromatic tables are per wavelength set, achromatic
/// ones collapse to one XYZW table, smooth ones are folded into the
/// multiple-scattering table and have none of their own.
pub enum SingleScatteringTextures {
    PerSet(Vec<ScatteringTexture>),
    SharedXyzw(ScatteringTexture),
    None,
}

pub fn transmittance_path(root: &Path, wl_set: usize) -> PathBuf {
    root.join(format!("transmittance-wlset{wl_set}.f32"))
}

pub fn irradiance_path(root: &Path, wl_set: usize) -> PathBuf {
    root.join(format!("irradiance-wlset{wl_set}.f32"))
}

pub fn multiple_scattering_path(root: &Path, wl_set: Option<usize>) -> PathBuf {
    match wl_set {
        Some(i) => root.join(format!("multiple-scattering-wlset{i}.f32")),
        None => root.join("multiple-scattering-xyzw.f32"),
    }
}

pub fn single_scattering_path(root: &Path, wl_set: Option<usize>, scatterer: &str) -> PathBuf {
    match wl_set {
        Some(i) => root
            .join("single-scattering")
            .join(i.to_string())
            .join(format!("{scatterer}.f32")),
        None => root
            .join("single-scattering")
            .join(format!("{scatterer}-xyzw.f32")),
    }
}

pub struct TextureCatalog {
    /// Per wavelength set.
    pub transmittance: Vec<LoadedTexture>,
    pub irradiance: Vec<LoadedTexture>,
    /// Per set, or a single XYZW entry when the data directory ships one
    /// shared multiple-scattering table.
    pub multiple_scattering: Vec<ScatteringTexture>,
    pub multiple_scattering_per_set: bool,
    pub single_scattering: HashMap<String, SingleScatteringTextures>,

    /// Eclipse attenuation render targets, one set per scatterer: chromatic
    /// scatterers own one target per wavelength set, everything else owns a
    /// single target all of its wavelength sets accumulate into.
    pub eclipse_attenuation: HashMap<String, Vec<LoadedTexture>>,

    pub bayer: LoadedTexture,
    pub dummy_2d: LoadedTexture,
    pub dummy_3d: LoadedTexture,
    pub linear_sampler: wgpu::Sampler,
    pub nearest_sampler: wgpu::Sampler,
}

impl TextureCatalog {
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data_root: &Path,
        params: &AtmosphereParameters,
        altitude_coord: f64,
    ) -> Result<Self, RenderError> {
        let wl_sets = params.wavelength_set_count();

        let mut transmittance = Vec::with_capacity(wl_sets);
        let mut irradiance = Vec::with_capacity(wl_sets);
        for set in 0..wl_sets {
            let path = transmittance_path(data_root, set);
            let table = load_table_2d(&path)?;
            transmittance.push(upload_table_2d(
                device,
                queue,
                &path.display().to_string(),
                &table,
            )?);

            let path = irradiance_path(data_root, set);
            let table = load_table_2d(&path)?;
            irradiance.push(upload_table_2d(
                device,
                queue,
                &path.display().to_string(),
                &table,
            )?);
        }

        let multiple_scattering_per_set =
            multiple_scattering_path(data_root, Some(0)).is_file();
        let mut multiple_scattering = Vec::new();
        if multiple_scattering_per_set {
            for set in 0..wl_sets {
                let path = multiple_scattering_path(data_root, Some(set));
                multiple_scattering.push(ScatteringTexture::load(
                    device,
                    queue,
                    &path,
                    altitude_coord,
                )?);
            }
        } else {
            let path = multiple_scattering_path(data_root, None);
            multiple_scattering.push(ScatteringTexture::load(
                device,
                queue,
                &path,
                altitude_coord,
            )?);
        }

        let mut single_scattering = HashMap::new();
        for scatterer in &params.scatterers {
            let textures = match scatterer.phase_function {
                PhaseFunctionKind::General => {
                    let mut per_set = Vec::with_capacity(wl_sets);
                    for set in 0..wl_sets {
                        let path = single_scattering_path(data_root, Some(set), &scatterer.name);
                        per_set.push(ScatteringTexture::load(
                            device,
                            queue,
                            &path,
                            altitude_coord,
                        )?);
                    }
                    SingleScatteringTextures::PerSet(per_set)
                }
                PhaseFunctionKind::Achromatic => {
                    let path = single_scattering_path(data_root, None, &scatterer.name);
                    SingleScatteringTextures::SharedXyzw(ScatteringTexture::load(
                        device,
                        queue,
                        &path,
                        altitude_coord,
                    )?)
                }
                PhaseFunctionKind::Smooth => SingleScatteringTextures::None,
            };
            single_scattering.insert(scatterer.name.clone(), textures);
        }

        let eclipse_size = wgpu::Extent3d {
            width: params.eclipse_angular_resolution,
            height: params.eclipse_zenith_resolution,
            depth_or_array_layers: 1,
        };
        let mut eclipse_attenuation = HashMap::new();
        for scatterer in &params.scatterers {
            let count = eclipse_attenuation_target_count(scatterer.phase_function, wl_sets);
            let mut targets = Vec::with_capacity(count);
            for set in 0..count {
                targets.push(create_render_target(
                    device,
                    &format!("eclipse-attenuation-{}-{set}", scatterer.name),
                    eclipse_size,
                )?);
            }
            eclipse_attenuation.insert(scatterer.name.clone(), targets);
        }

        let bayer = create_bayer_texture(device, queue)?;
        let dummy_2d = create_dummy_2d(device, queue)?;
        let dummy_3d = create_dummy_3d(device, queue)?;

        let linear_sampler = create_sampler(device, wgpu::FilterMode::Linear);
        let nearest_sampler = create_sampler(device, wgpu::FilterMode::Nearest);

        log::info!(
            "loaded radiance tables: {wl_sets} wavelength sets, {} multiple-scattering, {} scatterers",
            multiple_scattering.len(),
            single_scattering.len(),
        );

        Ok(Self {
            transmittance,
            irradiance,
            multiple_scattering,
            multiple_scattering_per_set,
            single_scattering,
            eclipse_attenuation,
            bayer,
            dummy_2d,
            dummy_3d,
            linear_sampler,
            nearest_sampler,
        })
    }

    /// Re-read 4D tables whose resident altitude bracket no longer contains
    /// the camera.
    pub fn reload_for_altitude(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        altitude_coord: f64,
    ) -> Result<(), RenderError> {
        for texture in &mut self.multiple_scattering {
            texture.reload_if_needed(device, queue, altitude_coord)?;
        }
        for textures in self.single_scattering.values_mut() {
            match textures {
                SingleScatteringTextures::PerSet(per_set) => {
                    for texture in per_set {
                        texture.reload_if_needed(device, queue, altitude_coord)?;
                    }
                }
                SingleScatteringTextures::SharedXyzw(texture) => {
                    texture.reload_if_needed(device, queue, altitude_coord)?;
                }
                SingleScatteringTextures::None => {}
            }
        }
        Ok(())
    }

    /// Spectral radiance capture needs full chromatic coverage: every
    /// scatterer resident per wavelength set and the multiple-scattering
    /// table per set too. One achromatic or smooth scatterer breaks it.
    pub fn can_grab_radiance(&self, wavelength_set_count: usize) -> bool {
        let lens = self.single_scattering.values().map(|textures| match textures {
            SingleScatteringTextures::PerSet(per_set) => Some(per_set.len()),
            _ => None,
        });
        radiance_capture_possible(lens, self.multiple_scattering.len(), wavelength_set_count)
    }

    pub fn sampler(&self, filtering: bool) -> &wgpu::Sampler {
        if filtering {
            &self.linear_sampler
        } else {
            &self.nearest_sampler
        }
    }
}

/// The capability rule behind [`TextureCatalog::can_grab_radiance`], over
/// resident sequence lengths; `None` marks a scatterer whose table is not
/// per wavelength set.
pub fn radiance_capture_possible<I>(
    single_scattering_lens: I,
    multiple_scattering_len: usize,
    wavelength_set_count: usize,
) -> bool
where
    I: IntoIterator<Item = Option<usize>>,
{
    multiple_scattering_len == wavelength_set_count
        && single_scattering_lens
            .into_iter()
            .all(|len| len == Some(wavelength_set_count))
}

/// Attenuation targets a scatterer owns: the per-set sequence for chromatic
/// phase functions collapses to one target for everything else.
pub fn eclipse_attenuation_target_count(kind: PhaseFunctionKind, wl_sets: usize) -> usize {
    if kind == PhaseFunctionKind::General {
        wl_sets
    } else {
        1
    }
}

fn guard_validation<T>(
    device: &wgpu::Device,
    context: &str,
    f: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    if let Some(error) = pollster::block_on(error_scope.pop()) {
        return Err(RenderError::Gpu {
            context: context.to_string(),
            message: error.to_string(),
        });
    }
    Ok(value)
}

pub fn upload_table_2d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    table: &Table2d,
) -> Result<LoadedTexture, RenderError> {
    let size = wgpu::Extent3d {
        width: u32::from(table.width),
        height: u32::from(table.height),
        depth_or_array_layers: 1,
    };
    guard_validation(device, label, || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LUMINANCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&table.subpixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * BYTES_PER_TEXEL),
                rows_per_image: Some(size.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        LoadedTexture { texture, view }
    })
}

pub fn upload_table_4d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    table: &Table4d,
) -> Result<LoadedTexture, RenderError> {
    let size = wgpu::Extent3d {
        width: table.header.tex_width(),
        height: table.header.tex_height(),
        depth_or_array_layers: table.header.tex_depth(),
    };
    guard_validation(device, label, || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: LUMINANCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&table.subpixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * BYTES_PER_TEXEL),
                rows_per_image: Some(size.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        LoadedTexture { texture, view }
    })
}

pub(crate) fn create_render_target(
    device: &wgpu::Device,
    label: &str,
    size: wgpu::Extent3d,
) -> Result<LoadedTexture, RenderError> {
    guard_validation(device, label, || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LUMINANCE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        LoadedTexture { texture, view }
    })
}

/// 8×8 Bayer threshold matrix as a tiny R32Float texture the tonemap shader
/// indexes with `frag_coord % 8`.
fn create_bayer_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<LoadedTexture, RenderError> {
    let size = wgpu::Extent3d {
        width: 8,
        height: 8,
        depth_or_array_layers: 1,
    };
    guard_validation(device, "bayer-pattern", || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("bayer-pattern"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&BAYER_PATTERN_8X8),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(8 * 4),
                rows_per_image: Some(8),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        LoadedTexture { texture, view }
    })
}

fn create_dummy_2d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<LoadedTexture, RenderError> {
    let table = Table2d {
        width: 1,
        height: 1,
        subpixels: vec![0.0; 4],
    };
    upload_table_2d(device, queue, "dummy-2d", &table)
}

fn create_dummy_3d(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<LoadedTexture, RenderError> {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    guard_validation(device, "dummy-3d", || {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("dummy-3d"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: LUMINANCE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&[0.0f32; 4]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_TEXEL),
                rows_per_image: Some(1),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        LoadedTexture { texture, view }
    })
}

fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("table-sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radiance_capture_rule() {
        // Two chromatic scatterers with full per-set coverage.
        assert!(radiance_capture_possible([Some(3), Some(3)], 3, 3));

        // One achromatic scatterer flips it false.
        assert!(!radiance_capture_possible([Some(3), None], 3, 3));

        // Short single-scattering sequence flips it false.
        assert!(!radiance_capture_possible([Some(2), Some(3)], 3, 3));

        // Shared multiple-scattering table flips it false.
        assert!(!radiance_capture_possible([Some(3), Some(3)], 1, 3));

        // No scatterers at all: only the multiple-scattering count decides.
        assert!(radiance_capture_possible(std::iter::empty(), 2, 2));
    }

    #[test]
    fn test_eclipse_attenuation_target_counts() {
        // Chromatic scatterers own one target per wavelength set; the rest
        // each own exactly one of their own, never a texture shared across
        // scatterers.
        assert_eq!(eclipse_attenuation_target_count(PhaseFunctionKind::General, 3), 3);
        assert_eq!(eclipse_attenuation_target_count(PhaseFunctionKind::Achromatic, 3), 1);
        assert_eq!(eclipse_attenuation_target_count(PhaseFunctionKind::Smooth, 3), 1);
    }

    #[test]
    fn test_table_file_names() {
        let root = Path::new("/data");
        assert_eq!(
            transmittance_path(root, 0),
            Path::new("/data/transmittance-wlset0.f32")
        );
        assert_eq!(
            irradiance_path(root, 3),
            Path::new("/data/irradiance-wlset3.f32")
        );
        assert_eq!(
            multiple_scattering_path(root, Some(2)),
            Path::new("/data/multiple-scattering-wlset2.f32")
        );
        assert_eq!(
            multiple_scattering_path(root, None),
            Path::new("/data/multiple-scattering-xyzw.f32")
        );
        assert_eq!(
            single_scattering_path(root, Some(1), "rayleigh"),
            Path::new("/data/single-scattering/1/rayleigh.f32")
        );
        assert_eq!(
            single_scattering_path(root, None, "aerosols"),
            Path::new("/data/single-scattering/aerosols-xyzw.f32")
        );
    }
}
