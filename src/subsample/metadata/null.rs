use super::{ImageMetadataRecord, MetadataTranscoder};
use crate::subsample::CacheError;

/// Strategy used when metadata support is unavailable: extraction yields an
/// empty record and reattachment leaves the bytes untouched.
pub struct NullTranscoder;

impl NullTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataTranscoder for NullTranscoder {
    fn extract(&self, _source: &[u8]) -> ImageMetadataRecord {
        ImageMetadataRecord::default()
    }

    fn apply(
        &self,
        target: Vec<u8>,
        _record: &ImageMetadataRecord,
        _orientation_baked: bool,
    ) -> Result<Vec<u8>, CacheError> {
        Ok(target)
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "Null Metadata Transcoder (metadata disabled)"
    }
}
