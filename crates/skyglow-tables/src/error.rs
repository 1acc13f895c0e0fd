use thiserror::Error;

/// Errors raised while reading a lookup-table file. Every variant names the
/// offending path and the operation that failed; a failed load aborts the
/// reload in progress rather than leaving partial state in use.
#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("failed to open \"{path}\": {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read header from \"{path}\": {source}")]
    Header {
        path: String,
        source: std::io::Error,
    },

    #[error("table \"{path}\" has a zero-sized dimension")]
    EmptyDimension { path: String },

    #[error("4D table \"{path}\" has {layers} altitude layers, need at least 2")]
    TooFewLayers { path: String, layers: u16 },

    #[error("failed to seek to offset {offset} in \"{path}\": {source}")]
    Seek {
        path: String,
        offset: u64,
        source: std::io::Error,
    },

    #[error("failed to read texture data from \"{path}\": {source}")]
    Payload {
        path: String,
        source: std::io::Error,
    },
}
