use thiserror::Error;

use skyglow_core::ParamsError;
use skyglow_tables::TableLoadError;

/// Errors raised while building or driving the sky renderer. All of them
/// are unrecoverable for the operation in progress: a malformed data
/// directory is a packaging mismatch the renderer cannot fix at runtime, so
/// they propagate out of construction or out of the reload entry points.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Table(#[from] TableLoadError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("failed to read shader directory \"{path}\": {source}")]
    ShaderDir {
        path: String,
        source: std::io::Error,
    },

    #[error("shader build failed for {context}: {message}")]
    Shader { context: String, message: String },

    #[error("GPU error during {context}: {message}")]
    Gpu { context: String, message: String },

    #[error(
        "numbers of multiple scattering shader programs and textures don't match: {programs} vs {textures}"
    )]
    ProgramTextureMismatch { programs: usize, textures: usize },

    #[error("GPU readback failed during {context}")]
    ReadbackFailed { context: String },
}
