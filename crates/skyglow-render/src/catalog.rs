//! Shader program catalog: every variant the data directory implies,
//! compiled up front so frame rendering never touches the filesystem.
//!
//! Variant enumeration rules live in [`crate::variants`]; this module turns
//! the enumerated sources into `wgpu::RenderPipeline`s. All accumulation
//! pipelines blend additively into Rgba32Float targets, so a frame is a
//! clear followed by one draw per enabled program.

use std::collections::HashMap;
use std::path::Path;

use skyglow_core::{AtmosphereParameters, SingleScatteringRenderMode};

use crate::error::RenderError;
use crate::variants::{
    self, compose_precompute_program, compose_scattering_program, compose_tonemap_program,
    compose_view_dir_probe_program, VariantAxes,
};

/// Format of every offscreen accumulation target.
pub const LUMINANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Pipelines for one scatterer, per render mode. The inner vector holds one
/// pipeline per wavelength set, or exactly one for shared variants; Smooth
/// scatterers have no entry at all outside eclipse shading.
pub type ScattererPipelines = HashMap<String, Vec<wgpu::RenderPipeline>>;

pub struct ProgramCatalog {
    pub uniform_bgl: wgpu::BindGroupLayout,
    pub table_bgl: wgpu::BindGroupLayout,
    pub tonemap_bgl: wgpu::BindGroupLayout,

    /// One pipeline per wavelength set.
    pub zero_order: Vec<wgpu::RenderPipeline>,
    /// Indexed by `SingleScatteringRenderMode as usize`.
    pub single_scattering: Vec<ScattererPipelines>,
    pub eclipsed_single_scattering: Vec<ScattererPipelines>,
    /// Eclipse attenuation precomputation, always one pipeline per
    /// wavelength set per scatterer.
    pub eclipse_precomputation: ScattererPipelines,
    /// One per wavelength set, or exactly one shared program.
    pub multiple_scattering: Vec<wgpu::RenderPipeline>,
    pub multiple_scattering_per_set: bool,

    pub view_direction: wgpu::RenderPipeline,
    pub tonemap: wgpu::RenderPipeline,
}

impl ProgramCatalog {
    /// Compile the full catalog from the data directory. Fails on the first
    /// unreadable directory or WGSL validation error, naming the variant.
    pub fn build(
        device: &wgpu::Device,
        data_root: &Path,
        params: &AtmosphereParameters,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let uniform_bgl = create_uniform_bgl(device);
        let table_bgl = create_table_bgl(device);
        let tonemap_bgl = create_tonemap_bgl(device);

        let sky_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky-pipeline-layout"),
            bind_group_layouts: &[Some(&uniform_bgl), Some(&table_bgl)],
            immediate_size: 0,
        });
        let tonemap_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tonemap-pipeline-layout"),
            bind_group_layouts: &[Some(&tonemap_bgl)],
            immediate_size: 0,
        });

        let wl_sets = params.wavelength_set_count();

        let mut zero_order = Vec::with_capacity(wl_sets);
        for set in 0..wl_sets {
            let context = format!("zero-order-scattering/{set}");
            let dir = variants::zero_order_dir(data_root, set);
            let source = compose_scattering_program(&variants::collect_fragment_sources(&dir)?);
            zero_order.push(create_scattering_pipeline(
                device, &sky_layout, &context, &source,
            )?);
        }

        let multiple_scattering_per_set = variants::multiple_scattering_is_per_set(data_root);
        let mut multiple_scattering = Vec::new();
        if multiple_scattering_per_set {
            for set in 0..wl_sets {
                let context = format!("multiple-scattering/{set}");
                let dir = variants::multiple_scattering_dir(data_root, Some(set));
                let source = compose_scattering_program(&variants::collect_fragment_sources(&dir)?);
                multiple_scattering.push(create_scattering_pipeline(
                    device, &sky_layout, &context, &source,
                )?);
            }
        } else {
            let dir = variants::multiple_scattering_dir(data_root, None);
            let source = compose_scattering_program(&variants::collect_fragment_sources(&dir)?);
            multiple_scattering.push(create_scattering_pipeline(
                device,
                &sky_layout,
                "multiple-scattering",
                &source,
            )?);
        }

        let mut single_scattering = Vec::new();
        let mut eclipsed_single_scattering = Vec::new();
        for eclipsed in [false, true] {
            let mut per_mode = Vec::with_capacity(SingleScatteringRenderMode::ALL.len());
            for mode in SingleScatteringRenderMode::ALL {
                let mut per_scatterer: ScattererPipelines = HashMap::new();
                for scatterer in &params.scatterers {
                    let axes =
                        variants::single_scattering_axes(scatterer.phase_function, mode, eclipsed);
                    let pipelines = match axes {
                        VariantAxes::None => continue,
                        VariantAxes::Shared => {
                            let dir = variants::single_scattering_dir(
                                data_root,
                                eclipsed,
                                mode,
                                None,
                                &scatterer.name,
                            );
                            let context = variant_context(eclipsed, mode, None, &scatterer.name);
                            let source = compose_scattering_program(
                                &variants::collect_fragment_sources(&dir)?,
                            );
                            vec![create_scattering_pipeline(
                                device, &sky_layout, &context, &source,
                            )?]
                        }
                        VariantAxes::PerWavelengthSet => {
                            let mut sets = Vec::with_capacity(wl_sets);
                            for set in 0..wl_sets {
                                let dir = variants::single_scattering_dir(
                                    data_root,
                                    eclipsed,
                                    mode,
                                    Some(set),
                                    &scatterer.name,
                                );
                                let context =
                                    variant_context(eclipsed, mode, Some(set), &scatterer.name);
                                let source = compose_scattering_program(
                                    &variants::collect_fragment_sources(&dir)?,
                                );
                                sets.push(create_scattering_pipeline(
                                    device, &sky_layout, &context, &source,
                                )?);
                            }
                            sets
                        }
                    };
                    per_scatterer.insert(scatterer.name.clone(), pipelines);
                }
                per_mode.push(per_scatterer);
            }
            if eclipsed {
                eclipsed_single_scattering = per_mode;
            } else {
                single_scattering = per_mode;
            }
        }

        let mut eclipse_precomputation: ScattererPipelines = HashMap::new();
        for scatterer in &params.scatterers {
            let mut sets = Vec::with_capacity(wl_sets);
            for set in 0..wl_sets {
                let dir =
                    variants::eclipse_precomputation_dir(data_root, set, &scatterer.name);
                let context = format!(
                    "single-scattering-eclipsed/precomputation/{set}/{}",
                    scatterer.name
                );
                let source =
                    compose_precompute_program(&variants::collect_fragment_sources(&dir)?);
                sets.push(create_precompute_pipeline(
                    device, &sky_layout, &context, &source,
                )?);
            }
            eclipse_precomputation.insert(scatterer.name.clone(), sets);
        }

        let view_direction = {
            let source = compose_view_dir_probe_program();
            let module = compile_module(device, "view-direction", &source)?;
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("view-direction-pipeline"),
                layout: Some(&sky_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: LUMINANCE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let tonemap = {
            let source = compose_tonemap_program();
            let module = compile_module(device, "tonemap", &source)?;
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("tonemap-pipeline"),
                layout: Some(&tonemap_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        log::info!(
            "compiled shader catalog: {} zero-order, {} multiple-scattering ({}), {} precomputation scatterers",
            zero_order.len(),
            multiple_scattering.len(),
            if multiple_scattering_per_set { "per set" } else { "shared" },
            eclipse_precomputation.len(),
        );

        Ok(Self {
            uniform_bgl,
            table_bgl,
            tonemap_bgl,
            zero_order,
            single_scattering,
            eclipsed_single_scattering,
            eclipse_precomputation,
            multiple_scattering,
            multiple_scattering_per_set,
            view_direction,
            tonemap,
        })
    }

    /// Pipelines to run for one scatterer's non-eclipsed single scattering,
    /// already resolved against the wavelength-set axis.
    pub fn single_scattering_for(
        &self,
        mode: SingleScatteringRenderMode,
        scatterer: &str,
    ) -> Option<&[wgpu::RenderPipeline]> {
        self.single_scattering[mode as usize]
            .get(scatterer)
            .map(Vec::as_slice)
    }

    pub fn eclipsed_single_scattering_for(
        &self,
        mode: SingleScatteringRenderMode,
        scatterer: &str,
    ) -> Option<&[wgpu::RenderPipeline]> {
        self.eclipsed_single_scattering[mode as usize]
            .get(scatterer)
            .map(Vec::as_slice)
    }
}

fn variant_context(
    eclipsed: bool,
    mode: SingleScatteringRenderMode,
    wl_set: Option<usize>,
    scatterer: &str,
) -> String {
    let pass = if eclipsed {
        "single-scattering-eclipsed"
    } else {
        "single-scattering"
    };
    match wl_set {
        Some(set) => format!("{pass}/{}/{set}/{scatterer}", mode.dir_name()),
        None => format!("{pass}/{}/{scatterer}", mode.dir_name()),
    }
}

/// Compile a WGSL module under a validation error scope so a malformed
/// variant surfaces as an error naming it instead of a device loss.
fn compile_module(
    device: &wgpu::Device,
    context: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, RenderError> {
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(context),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(error) = pollster::block_on(error_scope.pop()) {
        return Err(RenderError::Shader {
            context: context.to_string(),
            message: error.to_string(),
        });
    }
    Ok(module)
}

/// Accumulation pipeline with the dual luminance + radiance targets.
fn create_scattering_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    context: &str,
    source: &str,
) -> Result<wgpu::RenderPipeline, RenderError> {
    let module = compile_module(device, context, source)?;
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(context),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: LUMINANCE_FORMAT,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: LUMINANCE_FORMAT,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(error_scope.pop()) {
        return Err(RenderError::Shader {
            context: context.to_string(),
            message: error.to_string(),
        });
    }
    Ok(pipeline)
}

/// Single-target additive pipeline for the eclipse attenuation textures.
fn create_precompute_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    context: &str,
    source: &str,
) -> Result<wgpu::RenderPipeline, RenderError> {
    let module = compile_module(device, context, source)?;
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(context),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: LUMINANCE_FORMAT,
                blend: Some(ADDITIVE_BLEND),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(error_scope.pop()) {
        return Err(RenderError::Shader {
            context: context.to_string(),
            message: error.to_string(),
        });
    }
    Ok(pipeline)
}

fn create_uniform_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sky-uniform-bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// One fat layout for every lookup table a variant might sample; variants
/// that ignore a slot get a 1×1 dummy bound there.
fn create_table_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_2d = wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: wgpu::TextureViewDimension::D2,
        multisampled: false,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sky-table-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: texture_2d,
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: texture_2d,
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: texture_2d,
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Tonemap reads its input 1:1, so the luminance slot stays non-filterable
/// and needs no extra device features.
fn create_tonemap_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tonemap-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additive_blend_accumulates() {
        assert_eq!(ADDITIVE_BLEND.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(ADDITIVE_BLEND.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(ADDITIVE_BLEND.alpha.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn test_variant_context_names() {
        assert_eq!(
            variant_context(
                false,
                SingleScatteringRenderMode::Precomputed,
                Some(1),
                "rayleigh"
            ),
            "single-scattering/precomputed/1/rayleigh"
        );
        assert_eq!(
            variant_context(true, SingleScatteringRenderMode::OnTheFly, None, "aerosols"),
            "single-scattering-eclipsed/on-the-fly/aerosols"
        );
    }
}
