// Metadata transcoding - optional EXIF support behind the `metadata` feature
#[cfg(feature = "metadata")]
mod exif_transcoder;
mod null;
mod record;

#[cfg(feature = "metadata")]
pub use exif_transcoder::ExifTranscoder;
pub use null::NullTranscoder;
pub use record::{DisplayMetadata, ImageMetadataRecord, Orientation, Rational};

use super::CacheError;
use std::sync::Arc;
use tracing::{info, warn};

pub trait MetadataTranscoder: Send + Sync {
    /// Read the record from source bytes. Never fails: anything unreadable
    /// yields an empty record.
    fn extract(&self, source: &[u8]) -> ImageMetadataRecord;

    /// Replace whatever metadata `target` carries with the fields of
    /// `record`. When `orientation_baked` is set the orientation is not
    /// written, since the pixels are already upright.
    fn apply(
        &self,
        target: Vec<u8>,
        record: &ImageMetadataRecord,
        orientation_baked: bool,
    ) -> Result<Vec<u8>, CacheError>;

    fn is_available(&self) -> bool;
    fn name(&self) -> &str;
}

pub type DynMetadataTranscoder = Arc<dyn MetadataTranscoder>;

/// Resolve the metadata capability once at startup.
pub fn create_transcoder(enabled: bool) -> DynMetadataTranscoder {
    if !enabled {
        info!("Metadata disabled by configuration, automatic image rotation disabled");
        return Arc::new(NullTranscoder::new());
    }

    match exif_transcoder() {
        Some(transcoder) => {
            info!("Metadata support: {}", transcoder.name());
            transcoder
        }
        None => {
            warn!("EXIF support is not available, metadata and automatic image rotation disabled");
            Arc::new(NullTranscoder::new())
        }
    }
}

#[cfg(feature = "metadata")]
fn exif_transcoder() -> Option<DynMetadataTranscoder> {
    Some(Arc::new(ExifTranscoder::new()))
}

#[cfg(not(feature = "metadata"))]
fn exif_transcoder() -> Option<DynMetadataTranscoder> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_resolves_to_null() {
        let transcoder = create_transcoder(false);
        assert!(!transcoder.is_available());
    }

    #[test]
    fn test_enabled_follows_feature() {
        let transcoder = create_transcoder(true);
        assert_eq!(transcoder.is_available(), cfg!(feature = "metadata"));
    }
}
