use crate::{GalleryConfig, ImageSizeConfig};
use image::{DynamicImage, ImageBuffer, Rgb};
use std::path::Path;
use tempfile::TempDir;

/// Gallery config rooted in `temp_dir`. Only the pictures root is created.
pub(crate) fn test_gallery_config(temp_dir: &TempDir) -> GalleryConfig {
    let source_directory = temp_dir.path().join("photos");
    std::fs::create_dir_all(&source_directory).unwrap();

    GalleryConfig {
        source_directory,
        cache_directory: temp_dir.path().join("subsamples"),
        tiny: ImageSizeConfig {
            width: 200,
            height: 48,
        },
        lo: ImageSizeConfig {
            width: 1000,
            height: 200,
        },
        hi: ImageSizeConfig {
            width: 1600,
            height: 800,
        },
        jpeg_quality: Some(85),
        link_originals: true,
        metadata: true,
        pregenerate_cache: false,
    }
}

pub(crate) fn test_image(width: u32, height: u32) -> DynamicImage {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

pub(crate) fn write_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    test_image(width, height)
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

#[cfg(feature = "metadata")]
pub(crate) fn write_tagged_jpeg(
    path: &Path,
    width: u32,
    height: u32,
    record: &super::metadata::ImageMetadataRecord,
) {
    use super::metadata::{ExifTranscoder, MetadataTranscoder};
    use std::io::Cursor;

    let mut buffer = Cursor::new(Vec::new());
    test_image(width, height)
        .write_to(&mut buffer, image::ImageFormat::Jpeg)
        .unwrap();

    // Orientation is written as-is: the pixels are deliberately not rotated
    let tagged = ExifTranscoder::new()
        .apply(buffer.into_inner(), record, false)
        .unwrap();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, tagged).unwrap();
}
