use crate::Config;
use crate::subsample::ImageSize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create subsample directory: {0}")]
    CacheDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Pictures directory does not exist or is not readable: {0:?}")]
    SourceDirectoryMissing(PathBuf),

    #[error("Subsample size '{0}' has a zero width or height")]
    InvalidSubsampleSize(String),

    #[error("Metadata is enabled but this build has no EXIF support")]
    MetadataUnavailable,
}

impl StartupCheckError {
    /// Critical failures stop the server; the rest are logged and ignored.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::MetadataUnavailable)
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();
    let gallery = &config.gallery;

    info!("Performing startup checks...");

    // Check subsample directory
    let cache_dir = Path::new(&gallery.cache_directory);
    if !cache_dir.exists() {
        info!("Subsample directory does not exist, creating: {:?}", cache_dir);
        if let Err(e) = tokio::fs::create_dir_all(cache_dir).await {
            error!("Failed to create subsample directory: {}", e);
            errors.push(StartupCheckError::CacheDirectoryCreationFailed(e));
        } else {
            info!("Subsample directory created successfully");
        }
    } else {
        info!("Subsample directory exists: {:?}", cache_dir);
    }

    // Check pictures directory
    let source_dir = Path::new(&gallery.source_directory);
    if !source_dir.exists() {
        error!("Pictures directory does not exist: {:?}", source_dir);
        errors.push(StartupCheckError::SourceDirectoryMissing(
            source_dir.to_path_buf(),
        ));
    } else {
        match tokio::fs::read_dir(source_dir).await {
            Ok(_) => info!("Pictures directory is accessible: {:?}", source_dir),
            Err(e) => {
                error!("Pictures directory is not accessible: {}", e);
                errors.push(StartupCheckError::SourceDirectoryMissing(
                    source_dir.to_path_buf(),
                ));
            }
        }
    }

    // Check subsample bounding boxes
    for (name, size) in [("tiny", &gallery.tiny), ("lo", &gallery.lo), ("hi", &gallery.hi)] {
        if ImageSize::new(size.width, size.height).is_empty() {
            error!(
                "Subsample size '{}' must be at least 1x1, got {}x{}",
                name, size.width, size.height
            );
            errors.push(StartupCheckError::InvalidSubsampleSize(name.to_string()));
        }
    }

    if gallery.metadata && !cfg!(feature = "metadata") {
        warn!("Metadata is enabled in the configuration but EXIF support was not compiled in");
        errors.push(StartupCheckError::MetadataUnavailable);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
