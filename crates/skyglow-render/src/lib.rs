//! wgpu renderer for precomputed-atmosphere sky data directories.
//!
//! [`SkyRenderer`] owns every GPU resource: the shader variant catalog, the
//! resident radiance tables and the accumulation targets. The host supplies
//! a device, a queue and a [`skyglow_core::SkySettings`] implementation and
//! calls [`SkyRenderer::draw`] once per frame.

pub mod catalog;
pub mod error;
pub mod renderer;
pub mod targets;
pub mod textures;
pub mod variants;

pub use catalog::{ProgramCatalog, LUMINANCE_FORMAT};
pub use error::RenderError;
pub use renderer::{SkyRenderer, SkyUniforms, SpectralRadiance, TonemapUniforms};
pub use targets::FrameTargets;
pub use textures::TextureCatalog;

/// Device features the renderer needs: radiance tables are RGBA32F, sampled
/// with linear filtering, and every accumulation pipeline blends into
/// Rgba32Float targets.
pub const REQUIRED_FEATURES: wgpu::Features =
    wgpu::Features::FLOAT32_FILTERABLE.union(wgpu::Features::FLOAT32_BLENDABLE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_features_cover_float32_targets() {
        assert!(REQUIRED_FEATURES.contains(wgpu::Features::FLOAT32_FILTERABLE));
        assert!(REQUIRED_FEATURES.contains(wgpu::Features::FLOAT32_BLENDABLE));
    }
}
