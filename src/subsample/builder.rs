use super::metadata::{DynMetadataTranscoder, ImageMetadataRecord};
use super::{BuildReport, CacheError, CacheKey, ImageSize, ShardedStore, SizeFailure, SubsampleSize};
use crate::GalleryConfig;
use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder, imageops::FilterType};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Turns one source picture into any number of resized variants from a
/// single decode.
#[derive(Clone)]
pub struct SubsampleBuilder {
    store: ShardedStore,
    transcoder: DynMetadataTranscoder,
    tiny: ImageSize,
    lo: ImageSize,
    hi: ImageSize,
    jpeg_quality: u8,
}

impl SubsampleBuilder {
    pub fn new(config: &GalleryConfig, store: ShardedStore, transcoder: DynMetadataTranscoder) -> Self {
        Self {
            store,
            transcoder,
            tiny: ImageSize::new(config.tiny.width, config.tiny.height),
            lo: ImageSize::new(config.lo.width, config.lo.height),
            hi: ImageSize::new(config.hi.width, config.hi.height),
            jpeg_quality: config.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        }
    }

    /// Bounding box of a generated size.
    pub fn bounds(&self, size: SubsampleSize) -> Result<ImageSize, CacheError> {
        match size {
            SubsampleSize::Tiny => Ok(self.tiny),
            SubsampleSize::Lo => Ok(self.lo),
            SubsampleSize::Hi => Ok(self.hi),
            SubsampleSize::Original => Err(CacheError::UnknownSize(size.to_string())),
        }
    }

    /// Build every size in `stale_sizes` for `source_path`.
    ///
    /// Whole-call errors are limited to the shared steps (reading and
    /// decoding the source, unknown sizes). Once the source is decoded each
    /// size succeeds or fails on its own and the report carries both.
    pub fn build(
        &self,
        source_path: &Path,
        key: &CacheKey,
        stale_sizes: &[SubsampleSize],
    ) -> Result<BuildReport, CacheError> {
        let targets = stale_sizes
            .iter()
            .map(|size| self.bounds(*size).map(|bounds| (*size, bounds)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = BuildReport::default();
        if targets.is_empty() {
            return Ok(report);
        }

        let source = match std::fs::read(source_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::SourceMissing(source_path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let decoded = image::ImageReader::new(Cursor::new(&source))
            .with_guessed_format()?
            .decode()
            .map_err(CacheError::Decode)?;

        let record = self.transcoder.extract(&source);
        let upright = record.orientation.apply(decoded);
        debug!(
            "Decoded {:?}: {}x{} upright (orientation {:?})",
            source_path,
            upright.width(),
            upright.height(),
            record.orientation
        );

        let source_ext = source_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("jpg");

        for (size, bounds) in targets {
            match self.build_one(&upright, &record, key, source_ext, size, bounds) {
                Ok(path) => {
                    debug!("Built {} variant at {:?}", size, path);
                    report.built.insert(size, path);
                }
                Err(e) => {
                    error!("Failed to build {} variant of {:?}: {}", size, source_path, e);
                    report.failures.push(SizeFailure { size, error: e });
                }
            }
        }

        Ok(report)
    }

    fn build_one(
        &self,
        upright: &DynamicImage,
        record: &ImageMetadataRecord,
        key: &CacheKey,
        source_ext: &str,
        size: SubsampleSize,
        bounds: ImageSize,
    ) -> Result<PathBuf, CacheError> {
        let location = self.store.locate(key, size, source_ext);

        let resized = resize_image(upright, bounds);
        let mut bytes = encode_jpeg(&resized, self.jpeg_quality)?;

        if size.keeps_metadata() && self.transcoder.is_available() {
            let trimmed = record.trimmed();
            if !trimmed.is_empty() {
                match self.transcoder.apply(bytes.clone(), &trimmed, true) {
                    Ok(annotated) => bytes = annotated,
                    Err(e) => warn!("Storing {} variant without metadata: {}", size, e),
                }
            }
        }

        self.store.ensure_shard(&location.shard_dir)?;
        self.store.write(&location.path, &bytes)?;

        Ok(location.path)
    }
}

/// Scale down to fit `bounds`, preserving aspect ratio. Sources already
/// inside the box are used as they are.
fn resize_image(img: &DynamicImage, bounds: ImageSize) -> Cow<'_, DynamicImage> {
    let (width, height) = bounds.fit(img.width(), img.height());

    if width != img.width() || height != img.height() {
        Cow::Owned(img.resize_exact(width, height, FilterType::Lanczos3))
    } else {
        Cow::Borrowed(img)
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CacheError> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = image.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            rgb_image.as_raw(),
            rgb_image.width(),
            rgb_image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(CacheError::Encode)?;

    Ok(buffer.into_inner())
}
