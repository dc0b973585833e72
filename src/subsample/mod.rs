// Subsample module - resized, metadata-trimmed copies of pictures
mod builder;
mod cache;
mod error;
mod handlers;
mod key;
mod locks;
pub mod metadata;
mod pictures;
mod serve;
mod staleness;
mod store;
mod types;

#[cfg(test)]
mod test_helpers;

// Re-export public items
pub use builder::SubsampleBuilder;
pub use cache::Prepared;
pub use error::CacheError;
pub use handlers::{metadata_handler, picture_handler};
pub use key::derive_key;
pub use locks::{BuildGuard, BuildLocks};
pub use pictures::{PICTURE_EXTENSIONS, is_picture, sanitize_relative_path, walk_pictures};
pub use staleness::StalenessOracle;
pub use store::ShardedStore;
pub use types::*;

use metadata::DynMetadataTranscoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type SharedSubsampleCache = Arc<SubsampleCache>;

/// The subsample cache: key derivation, sharded storage, staleness checks and
/// the builder, composed behind `locate_or_build`.
pub struct SubsampleCache {
    pub(crate) config: crate::GalleryConfig,
    pub(crate) store: ShardedStore,
    pub(crate) oracle: StalenessOracle,
    pub(crate) builder: SubsampleBuilder,
    pub(crate) transcoder: DynMetadataTranscoder,
    pub(crate) locks: BuildLocks,
}

impl SubsampleCache {
    pub fn new(config: crate::GalleryConfig) -> Self {
        let transcoder = metadata::create_transcoder(config.metadata);
        Self::with_transcoder(config, transcoder)
    }

    pub fn with_transcoder(config: crate::GalleryConfig, transcoder: DynMetadataTranscoder) -> Self {
        let store = ShardedStore::new(&config.cache_directory);
        let oracle = StalenessOracle::new(store.clone());
        let builder = SubsampleBuilder::new(&config, store.clone(), transcoder.clone());

        Self {
            config,
            store,
            oracle,
            builder,
            transcoder,
            locks: BuildLocks::new(),
        }
    }

    pub fn config(&self) -> &crate::GalleryConfig {
        &self.config
    }

    pub fn store(&self) -> &ShardedStore {
        &self.store
    }

    pub fn metadata_available(&self) -> bool {
        self.transcoder.is_available()
    }

    pub(crate) fn source_path(&self, relative_path: &str) -> PathBuf {
        self.config.source_directory.join(relative_path)
    }

    /// Parse a requested size. `original` is only accepted when originals
    /// are linked.
    pub fn parse_size(&self, size: &str) -> Result<SubsampleSize, CacheError> {
        match size.parse::<SubsampleSize>()? {
            SubsampleSize::Original if !self.config.link_originals => {
                Err(CacheError::UnknownSize(size.to_string()))
            }
            parsed => Ok(parsed),
        }
    }
}

pub(crate) fn extension_of(relative_path: &str) -> &str {
    Path::new(relative_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("jpg")
}
