//! Frame orchestration: precompute, clear, accumulate, tonemap.
//!
//! A frame is a sequence of small synchronous submissions, one per draw,
//! with the shared uniform buffer rewritten before each. Every accumulation
//! draw adds into the viewport-sized XYZW luminance target (and, while
//! spectral capture is on, into the per-wavelength-set radiance targets);
//! the tonemap pass then resolves luminance to the surface.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::DVec3;

use skyglow_core::constants::SUN_DRAG_SCALE;
use skyglow_core::math;
use skyglow_core::{AtmosphereParameters, PhaseFunctionKind, SingleScatteringRenderMode, SkySettings};

use crate::catalog::ProgramCatalog;
use crate::error::RenderError;
use crate::targets::FrameTargets;
use crate::textures::{SingleScatteringTextures, TextureCatalog};
use crate::variants::{self, VariantAxes};

/// Must match `SkyUniforms` in `shaders/preamble.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyUniforms {
    pub camera_position: [f32; 4],
    pub sun_direction: [f32; 4],
    pub moon_position: [f32; 4],
    pub zoom_factor: f32,
    pub static_altitude_tex_coord: f32,
    pub moon_angular_radius: f32,
    pub sun_zenith_angle: f32,
}

/// Must match `TonemapUniforms` in `shaders/tonemap.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TonemapUniforms {
    pub rgb_max: [f32; 3],
    pub exposure: f32,
}

/// Result of a spectral radiance probe: one radiance per wavelength, plus
/// the direction the probed pixel looks along, in degrees.
#[derive(Debug, Clone)]
pub struct SpectralRadiance {
    pub wavelengths: Vec<f32>,
    pub radiances: Vec<f32>,
    pub azimuth: f64,
    pub elevation: f64,
}

/// Per-frame geometry derived once from the settings.
struct FrameGeometry {
    camera_position: DVec3,
    sun_direction: DVec3,
    moon_position: DVec3,
    /// Moon in the sun-relative azimuth frame the eclipse precomputation is
    /// parameterized in.
    moon_position_sun_relative: DVec3,
    moon_angular_radius: f64,
    zoom_factor: f32,
    sun_zenith_angle: f64,
    altitude_coord: f64,
}

impl FrameGeometry {
    fn from_settings(params: &AtmosphereParameters, settings: &dyn SkySettings) -> Self {
        let altitude = settings.altitude();
        let moon_distance = math::camera_moon_distance(
            altitude,
            params.earth_radius,
            params.earth_moon_distance,
            settings.moon_zenith_angle(),
        );
        Self {
            camera_position: math::camera_position(altitude),
            sun_direction: math::sun_direction(
                settings.sun_azimuth(),
                settings.sun_zenith_angle(),
            ),
            moon_position: math::moon_position(
                altitude,
                settings.moon_azimuth(),
                settings.moon_zenith_angle(),
                moon_distance,
            ),
            moon_position_sun_relative: math::moon_position_relative_to_sun_azimuth(
                altitude,
                settings.moon_azimuth(),
                settings.sun_azimuth(),
                settings.moon_zenith_angle(),
                moon_distance,
            ),
            moon_angular_radius: math::moon_angular_radius(params.moon_radius, moon_distance),
            zoom_factor: settings.zoom_factor(),
            sun_zenith_angle: settings.sun_zenith_angle(),
            altitude_coord: math::altitude_unit_range_coord(
                altitude,
                params.earth_radius,
                params.atmosphere_height,
            ),
        }
    }

    fn uniforms(&self, static_altitude_tex_coord: f32, sun_relative_moon: bool) -> SkyUniforms {
        let moon = if sun_relative_moon {
            self.moon_position_sun_relative
        } else {
            self.moon_position
        };
        SkyUniforms {
            camera_position: vec4(self.camera_position),
            sun_direction: vec4(self.sun_direction),
            moon_position: vec4(moon),
            zoom_factor: self.zoom_factor,
            static_altitude_tex_coord,
            moon_angular_radius: self.moon_angular_radius as f32,
            sun_zenith_angle: self.sun_zenith_angle as f32,
        }
    }
}

fn vec4(v: DVec3) -> [f32; 4] {
    [v.x as f32, v.y as f32, v.z as f32, 0.0]
}

struct DragState {
    last_x: f64,
    last_y: f64,
}

pub struct SkyRenderer {
    params: AtmosphereParameters,
    data_root: PathBuf,
    surface_format: wgpu::TextureFormat,
    catalog: ProgramCatalog,
    textures: TextureCatalog,
    targets: FrameTargets,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    tonemap_uniform_buffer: wgpu::Buffer,
    disabled_scatterers: HashSet<String>,
    can_grab_radiance: bool,
    drag: Option<DragState>,
}

impl SkyRenderer {
    /// Load the atmosphere description, all radiance tables and the full
    /// shader catalog. Reports the spectral-capture capability back through
    /// the settings before returning.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data_root: &Path,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: &mut dyn SkySettings,
    ) -> Result<Self, RenderError> {
        let params = AtmosphereParameters::load(data_root)?;
        let altitude_coord = math::altitude_unit_range_coord(
            settings.altitude(),
            params.earth_radius,
            params.atmosphere_height,
        );

        let textures = TextureCatalog::load(device, queue, data_root, &params, altitude_coord)?;
        let catalog = ProgramCatalog::build(device, data_root, &params, surface_format)?;
        check_consistency(&catalog, &textures)?;

        let can_grab_radiance = textures.can_grab_radiance(params.wavelength_set_count());
        settings.set_can_grab_radiance(can_grab_radiance);

        let targets = FrameTargets::new(
            device,
            width,
            height,
            params.wavelength_set_count(),
            can_grab_radiance,
        )?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sky-uniforms"),
            size: std::mem::size_of::<SkyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let tonemap_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tonemap-uniforms"),
            size: std::mem::size_of::<TonemapUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group =
            create_uniform_bind_group(device, &catalog.uniform_bgl, &uniform_buffer);

        Ok(Self {
            params,
            data_root: data_root.to_path_buf(),
            surface_format,
            catalog,
            textures,
            targets,
            uniform_buffer,
            uniform_bind_group,
            tonemap_uniform_buffer,
            disabled_scatterers: HashSet::new(),
            can_grab_radiance,
            drag: None,
        })
    }

    pub fn can_grab_radiance(&self) -> bool {
        self.can_grab_radiance
    }

    pub fn wavelengths(&self) -> &[f32] {
        &self.params.wavelengths
    }

    pub fn luminance_texture(&self) -> &wgpu::Texture {
        &self.targets.luminance.texture
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.targets.resize(device, width, height)
    }

    /// Exclude or re-include one scatterer's single-scattering contribution.
    pub fn set_scatterer_enabled(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.disabled_scatterers.remove(name);
        } else {
            self.disabled_scatterers.insert(name.to_string());
        }
    }

    /// Recompile the whole shader catalog from the data directory.
    pub fn reload_shaders(&mut self, device: &wgpu::Device) -> Result<(), RenderError> {
        let catalog =
            ProgramCatalog::build(device, &self.data_root, &self.params, self.surface_format)?;
        check_consistency(&catalog, &self.textures)?;
        self.uniform_bind_group =
            create_uniform_bind_group(device, &catalog.uniform_bgl, &self.uniform_buffer);
        self.catalog = catalog;
        Ok(())
    }

    /// Render one complete frame into `surface_view`.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &mut dyn SkySettings,
        surface_view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let geometry = FrameGeometry::from_settings(&self.params, settings);
        self.textures
            .reload_for_altitude(device, queue, geometry.altitude_coord)?;

        let mode = settings.single_scattering_render_mode();
        let eclipsed = settings.eclipse_shading_enabled();
        let filtering = settings.texture_filtering_enabled();

        self.clear_targets(device, queue);

        if settings.zero_order_scattering_enabled() {
            for set in 0..self.params.wavelength_set_count() {
                let uniforms = geometry.uniforms(0.5, false);
                let bind_group = self.table_bind_group(
                    device,
                    set,
                    &self.textures.dummy_3d.view,
                    &self.textures.dummy_2d.view,
                    filtering,
                );
                self.accumulate(
                    device,
                    queue,
                    &self.catalog.zero_order[set],
                    &uniforms,
                    &bind_group,
                    set,
                );
            }
        }

        if settings.single_scattering_enabled() {
            // The attenuation textures are independent of the accumulation
            // targets, so this runs in both render modes.
            if eclipsed {
                self.precompute_eclipse_attenuation(device, queue, &geometry, filtering)?;
            }
            self.draw_single_scattering(device, queue, &geometry, mode, eclipsed, filtering)?;
        }

        if settings.multiple_scattering_enabled() {
            for (set, texture) in self.textures.multiple_scattering.iter().enumerate() {
                let uniforms = geometry.uniforms(texture.slice.static_tex_coord, false);
                let bind_group = self.table_bind_group(
                    device,
                    if self.textures.multiple_scattering_per_set { set } else { 0 },
                    &texture.view,
                    &self.textures.dummy_2d.view,
                    filtering,
                );
                self.accumulate(
                    device,
                    queue,
                    &self.catalog.multiple_scattering[set],
                    &uniforms,
                    &bind_group,
                    set,
                );
            }
        }

        self.tonemap(device, queue, settings, surface_view);
        Ok(())
    }

    fn draw_single_scattering(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        geometry: &FrameGeometry,
        mode: SingleScatteringRenderMode,
        eclipsed: bool,
        filtering: bool,
    ) -> Result<(), RenderError> {
        for scatterer in &self.params.scatterers {
            if self.disabled_scatterers.contains(&scatterer.name) {
                continue;
            }
            let pipelines = if eclipsed {
                self.catalog.eclipsed_single_scattering_for(mode, &scatterer.name)
            } else {
                self.catalog.single_scattering_for(mode, &scatterer.name)
            };
            let Some(pipelines) = pipelines else {
                // Smooth scatterers are folded into the multiple-scattering
                // table outside eclipse shading.
                continue;
            };
            let textures = &self.textures.single_scattering[&scatterer.name];
            let axes = variants::single_scattering_axes(scatterer.phase_function, mode, eclipsed);

            if axes == VariantAxes::Shared {
                // Shared XYZW variant: one draw for the whole spectrum.
                let (view_3d, static_coord) = match textures {
                    SingleScatteringTextures::SharedXyzw(texture)
                        if mode == SingleScatteringRenderMode::Precomputed =>
                    {
                        (&texture.view, texture.slice.static_tex_coord)
                    }
                    _ => (&self.textures.dummy_3d.view, 0.5),
                };
                let eclipsed_view = if eclipsed {
                    &self.textures.eclipse_attenuation[&scatterer.name][0].view
                } else {
                    &self.textures.dummy_2d.view
                };
                let uniforms = geometry.uniforms(static_coord, false);
                let bind_group =
                    self.table_bind_group(device, 0, view_3d, eclipsed_view, filtering);
                self.accumulate(device, queue, &pipelines[0], &uniforms, &bind_group, 0);
                continue;
            }

            for (set, pipeline) in pipelines.iter().enumerate() {
                let (view_3d, static_coord) = match textures {
                    SingleScatteringTextures::PerSet(per_set)
                        if mode == SingleScatteringRenderMode::Precomputed && !eclipsed =>
                    {
                        (&per_set[set].view, per_set[set].slice.static_tex_coord)
                    }
                    _ => (&self.textures.dummy_3d.view, 0.5),
                };
                let eclipsed_view = if eclipsed && mode == SingleScatteringRenderMode::Precomputed
                {
                    // Per-set precomputed eclipsed variants only exist for
                    // chromatic scatterers, whose targets are per set too.
                    &self.textures.eclipse_attenuation[&scatterer.name][set].view
                } else {
                    &self.textures.dummy_2d.view
                };
                let uniforms = geometry.uniforms(static_coord, false);
                let bind_group =
                    self.table_bind_group(device, set, view_3d, eclipsed_view, filtering);
                self.accumulate(device, queue, pipeline, &uniforms, &bind_group, set);
            }
        }
        Ok(())
    }

    /// Re-render the eclipse attenuation textures for the current sun and
    /// moon geometry. Each scatterer writes only into its own targets:
    /// chromatic ones overwrite one target per wavelength set, the rest
    /// overwrite their single target with set 0 and blend the later sets in.
    fn precompute_eclipse_attenuation(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        geometry: &FrameGeometry,
        filtering: bool,
    ) -> Result<(), RenderError> {
        for scatterer in &self.params.scatterers {
            let Some(pipelines) = self.catalog.eclipse_precomputation.get(&scatterer.name) else {
                continue;
            };
            let targets = &self.textures.eclipse_attenuation[&scatterer.name];
            for (set, pipeline) in pipelines.iter().enumerate() {
                let plan = eclipse_draw_plan(scatterer.phase_function, set);
                let target_view = &targets[plan.target].view;
                let load = if plan.overwrite {
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                } else {
                    wgpu::LoadOp::Load
                };

                let (view_3d, static_coord) =
                    match &self.textures.single_scattering[&scatterer.name] {
                        SingleScatteringTextures::PerSet(per_set) => {
                            (&per_set[set].view, per_set[set].slice.static_tex_coord)
                        }
                        SingleScatteringTextures::SharedXyzw(texture) => {
                            (&texture.view, texture.slice.static_tex_coord)
                        }
                        SingleScatteringTextures::None => (&self.textures.dummy_3d.view, 0.5),
                    };

                let uniforms = geometry.uniforms(static_coord, true);
                queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
                let bind_group = self.table_bind_group(
                    device,
                    set,
                    view_3d,
                    &self.textures.dummy_2d.view,
                    filtering,
                );

                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("eclipse-precompute"),
                    });
                {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("eclipse-precompute"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: target_view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    });
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                    pass.set_bind_group(1, &bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                queue.submit(Some(encoder.finish()));
            }
        }
        Ok(())
    }

    /// Reset the accumulation targets to transparent black with draw-free
    /// clearing passes.
    fn clear_targets(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clear-targets"),
        });
        let mut views = vec![&self.targets.luminance.view];
        if self.targets.radiance_capture() {
            for set in 0..self.params.wavelength_set_count() {
                views.push(self.targets.radiance_view(set));
            }
        }
        for view in views {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        queue.submit(Some(encoder.finish()));
    }

    /// One additive draw into the luminance target and the wavelength set's
    /// radiance target (or the sink).
    fn accumulate(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &wgpu::RenderPipeline,
        uniforms: &SkyUniforms,
        table_bind_group: &wgpu::BindGroup,
        wl_set: usize,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("accumulate"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("accumulate"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.luminance.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: self.targets.radiance_view(wl_set),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, table_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
    }

    fn tonemap(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &dyn SkySettings,
        surface_view: &wgpu::TextureView,
    ) {
        let uniforms = TonemapUniforms {
            rgb_max: settings.dithering_mode().rgb_max(),
            exposure: settings.exposure(),
        };
        queue.write_buffer(
            &self.tonemap_uniform_buffer,
            0,
            bytemuck::bytes_of(&uniforms),
        );
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tonemap-bind-group"),
            layout: &self.catalog.tonemap_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.tonemap_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.targets.luminance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.textures.nearest_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.textures.bayer.view),
                },
            ],
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tonemap"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tonemap"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.catalog.tonemap);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
    }

    /// Accumulated XYZW luminance of one pixel of the last frame.
    pub fn get_pixel_luminance(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
    ) -> Result<[f32; 4], RenderError> {
        self.targets
            .read_pixel(device, queue, &self.targets.luminance.texture, x, y)
    }

    /// Spectral radiance of one pixel of the last frame, plus the direction
    /// the pixel looks along. Returns `None` when the data directory lacks
    /// full chromatic coverage.
    pub fn get_pixel_spectral_radiance(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &dyn SkySettings,
        x: u32,
        y: u32,
    ) -> Result<Option<SpectralRadiance>, RenderError> {
        if !self.can_grab_radiance || !self.targets.radiance_capture() {
            return Ok(None);
        }
        let mut radiances = Vec::with_capacity(self.params.wavelengths.len());
        for set in 0..self.params.wavelength_set_count() {
            let pixel =
                self.targets
                    .read_pixel(device, queue, self.targets.radiance_texture(set), x, y)?;
            radiances.extend_from_slice(&pixel);
        }

        let direction = self.probe_view_direction(device, queue, settings, x, y)?;
        let (azimuth, elevation) = direction_angles(direction);

        Ok(Some(SpectralRadiance {
            wavelengths: self.params.wavelengths.clone(),
            radiances,
            azimuth,
            elevation,
        }))
    }

    /// Render the view-direction probe and read back the probed pixel.
    fn probe_view_direction(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: &dyn SkySettings,
        x: u32,
        y: u32,
    ) -> Result<[f32; 4], RenderError> {
        let uniforms = SkyUniforms {
            camera_position: [0.0; 4],
            sun_direction: [0.0, 0.0, 1.0, 0.0],
            moon_position: [0.0; 4],
            zoom_factor: settings.zoom_factor(),
            static_altitude_tex_coord: 0.5,
            moon_angular_radius: 0.0,
            sun_zenith_angle: 0.0,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let bind_group = self.table_bind_group(
            device,
            0,
            &self.textures.dummy_3d.view,
            &self.textures.dummy_2d.view,
            false,
        );
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("view-direction-probe"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("view-direction-probe"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.view_direction.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.catalog.view_direction);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
        self.targets
            .read_pixel(device, queue, &self.targets.view_direction.texture, x, y)
    }

    /// Begin a sun-drag gesture at the given window coordinates.
    pub fn begin_sun_drag(&mut self, x: f64, y: f64) {
        self.drag = Some(DragState { last_x: x, last_y: y });
    }

    /// Continue a sun-drag gesture; updates the sun angles through the
    /// settings write-backs.
    pub fn drag_move(&mut self, settings: &mut dyn SkySettings, x: f64, y: f64) {
        let Some(drag) = &mut self.drag else {
            return;
        };
        let delta_x = x - drag.last_x;
        let delta_y = y - drag.last_y;
        drag.last_x = x;
        drag.last_y = y;
        apply_sun_drag(settings, delta_x, delta_y);
    }

    pub fn end_sun_drag(&mut self) {
        self.drag = None;
    }

    fn table_bind_group(
        &self,
        device: &wgpu::Device,
        wl_set: usize,
        scattering_3d: &wgpu::TextureView,
        eclipsed_2d: &wgpu::TextureView,
        filtering: bool,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky-table-bind-group"),
            layout: &self.catalog.table_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        &self.textures.transmittance[wl_set].view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        &self.textures.irradiance[wl_set].view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(scattering_3d),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(eclipsed_2d),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(self.textures.sampler(filtering)),
                },
            ],
        })
    }
}

/// Which attenuation target one eclipse precomputation draw writes, and
/// whether it overwrites the target or blends into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EclipseDraw {
    target: usize,
    overwrite: bool,
}

/// The decision depends only on the scatterer's own phase function and the
/// wavelength set, so a new scatterer always starts with an overwrite.
fn eclipse_draw_plan(kind: PhaseFunctionKind, wl_set: usize) -> EclipseDraw {
    if kind == PhaseFunctionKind::General {
        EclipseDraw { target: wl_set, overwrite: true }
    } else {
        EclipseDraw { target: 0, overwrite: wl_set == 0 }
    }
}

/// Map a drag delta in window pixels onto the sun angles: dragging down
/// lowers the sun, dragging left swings the azimuth negative. Both angles
/// saturate at their limits instead of wrapping.
fn apply_sun_drag(settings: &mut dyn SkySettings, delta_x: f64, delta_y: f64) {
    let zenith = (settings.sun_zenith_angle() + delta_y / SUN_DRAG_SCALE)
        .clamp(0.0, std::f64::consts::PI);
    let azimuth = (settings.sun_azimuth() + delta_x / SUN_DRAG_SCALE)
        .clamp(-std::f64::consts::PI, std::f64::consts::PI);
    settings.set_sun_zenith_angle(zenith);
    settings.set_sun_azimuth(azimuth);
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sky-uniform-bind-group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn check_consistency(
    catalog: &ProgramCatalog,
    textures: &TextureCatalog,
) -> Result<(), RenderError> {
    if catalog.multiple_scattering.len() != textures.multiple_scattering.len() {
        return Err(RenderError::ProgramTextureMismatch {
            programs: catalog.multiple_scattering.len(),
            textures: textures.multiple_scattering.len(),
        });
    }
    Ok(())
}

/// Azimuth and elevation, in degrees, of a unit view direction; a zero
/// horizontal component reports azimuth 0.
fn direction_angles(direction: [f32; 4]) -> (f64, f64) {
    let x = direction[0] as f64;
    let y = direction[1] as f64;
    let z = direction[2] as f64;
    let azimuth = if x == 0.0 && y == 0.0 {
        0.0
    } else {
        y.atan2(x).to_degrees()
    };
    let elevation = z.clamp(-1.0, 1.0).asin().to_degrees();
    (azimuth, elevation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyglow_core::SettingsState;

    #[test]
    fn test_direction_angles() {
        let (az, el) = direction_angles([1.0, 0.0, 0.0, 1.0]);
        assert!(az.abs() < 1e-9);
        assert!(el.abs() < 1e-9);

        let (az, el) = direction_angles([0.0, 1.0, 0.0, 1.0]);
        assert!((az - 90.0).abs() < 1e-9);
        assert!(el.abs() < 1e-9);

        let (az, el) = direction_angles([0.0, 0.0, 1.0, 1.0]);
        assert_eq!(az, 0.0);
        assert!((el - 90.0).abs() < 1e-9);

        // Slightly above unit length still clamps cleanly.
        let (_, el) = direction_angles([0.0, 0.0, 1.0000001, 1.0]);
        assert!((el - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_sun_drag_scale_and_clamping() {
        let mut settings = SettingsState::default();
        settings.sun_zenith_angle = 1.0;
        settings.sun_azimuth = 0.0;

        // Dragging 100 px down pushes the sun toward the horizon.
        apply_sun_drag(&mut settings, 0.0, 100.0);
        assert!((settings.sun_zenith_angle - 1.2).abs() < 1e-12);

        // 500 px is one radian; dragging left swings the azimuth negative.
        apply_sun_drag(&mut settings, -250.0, 0.0);
        assert!((settings.sun_azimuth + 0.5).abs() < 1e-12);

        // Saturates at the poles and the azimuth seam.
        apply_sun_drag(&mut settings, -1e7, 1e7);
        assert_eq!(settings.sun_zenith_angle, std::f64::consts::PI);
        assert_eq!(settings.sun_azimuth, -std::f64::consts::PI);
    }

    #[test]
    fn test_eclipse_attenuation_per_scatterer_accumulation() {
        use PhaseFunctionKind::*;

        // Chromatic: every wavelength set overwrites its own target.
        for set in 0..3 {
            let plan = eclipse_draw_plan(General, set);
            assert_eq!(plan, EclipseDraw { target: set, overwrite: true });
        }

        // Achromatic and Smooth: all sets land in the scatterer's single
        // target, set 0 overwriting and later sets blending in.
        for kind in [Achromatic, Smooth] {
            assert_eq!(eclipse_draw_plan(kind, 0), EclipseDraw { target: 0, overwrite: true });
            assert_eq!(eclipse_draw_plan(kind, 1), EclipseDraw { target: 0, overwrite: false });
            assert_eq!(eclipse_draw_plan(kind, 2), EclipseDraw { target: 0, overwrite: false });
        }

        // Two non-chromatic scatterers rendered back to back: the second
        // one's first set still overwrites, so nothing of the first
        // scatterer leaks into it.
        assert!(!eclipse_draw_plan(Achromatic, 2).overwrite);
        assert!(eclipse_draw_plan(Smooth, 0).overwrite);
    }

    #[test]
    fn test_sky_uniforms_layout() {
        assert_eq!(std::mem::size_of::<SkyUniforms>(), 64);
        assert_eq!(std::mem::size_of::<TonemapUniforms>(), 16);
    }

    #[test]
    fn test_frame_geometry_overhead_sun() {
        let params = test_params();
        let mut settings = SettingsState::default();
        settings.sun_zenith_angle = 0.0;
        settings.sun_azimuth = 0.0;
        let geometry = FrameGeometry::from_settings(&params, &settings);
        assert!((geometry.sun_direction.z - 1.0).abs() < 1e-12);
        assert!(geometry.altitude_coord > 0.0 && geometry.altitude_coord < 1.0);
    }

    #[test]
    fn test_uniforms_select_moon_frame() {
        let params = test_params();
        let mut settings = SettingsState::default();
        settings.sun_azimuth = 1.0;
        settings.moon_azimuth = 2.0;
        let geometry = FrameGeometry::from_settings(&params, &settings);
        let absolute = geometry.uniforms(0.5, false);
        let relative = geometry.uniforms(0.5, true);
        assert_ne!(absolute.moon_position, relative.moon_position);
        assert_eq!(absolute.sun_direction, relative.sun_direction);
    }

    fn test_params() -> AtmosphereParameters {
        AtmosphereParameters {
            earth_radius: 6_371_000.0,
            atmosphere_height: 120_000.0,
            earth_moon_distance: 384_400_000.0,
            moon_radius: 1_737_400.0,
            wavelengths: vec![
                400.0, 440.0, 480.0, 520.0, 560.0, 600.0, 640.0, 680.0,
            ],
            scatterers: vec![],
            eclipse_angular_resolution: 512,
            eclipse_zenith_resolution: 128,
        }
    }
}
