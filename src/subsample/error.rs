use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Source picture not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Unknown subsample size: {0}")]
    UnknownSize(String),

    #[error("Invalid path")]
    InvalidPath,

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    /// True for failures caused by the request rather than by the server.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::SourceMissing(_) | CacheError::UnknownSize(_) | CacheError::InvalidPath
        )
    }
}
