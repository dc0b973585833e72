use super::{ImageMetadataRecord, MetadataTranscoder, Orientation, Rational};
use crate::subsample::CacheError;
use chrono::NaiveDateTime;
use img_parts::ImageEXIF;
use img_parts::jpeg::Jpeg;
use rexif::{ExifData, ExifTag, TagValue};
use tracing::{debug, trace};

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Reads EXIF with `rexif` and writes a fresh EXIF block with the
/// `kamadak-exif` writer, spliced into the JPEG by `img-parts`.
pub struct ExifTranscoder;

impl ExifTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExifTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataTranscoder for ExifTranscoder {
    fn extract(&self, source: &[u8]) -> ImageMetadataRecord {
        let (result, warnings) = rexif::parse_buffer_quiet(source);
        for warning in warnings {
            trace!("EXIF warning: {}", warning);
        }

        match result {
            Ok(exif) => record_from_exif(&exif),
            Err(e) => {
                trace!("No EXIF data: {}", e);
                ImageMetadataRecord::default()
            }
        }
    }

    fn apply(
        &self,
        target: Vec<u8>,
        record: &ImageMetadataRecord,
        orientation_baked: bool,
    ) -> Result<Vec<u8>, CacheError> {
        let mut jpeg = Jpeg::from_bytes(target.into())
            .map_err(|e| CacheError::Metadata(format!("Failed to parse JPEG: {}", e)))?;

        // Whatever the encoder emitted is discarded first
        jpeg.set_exif(None);

        let tiff = encode_exif(record, orientation_baked)?;
        if let Some(tiff) = tiff {
            debug!("Embedding {} bytes of EXIF", tiff.len());
            jpeg.set_exif(Some(tiff.into()));
        }

        let mut output = Vec::new();
        jpeg.encoder()
            .write_to(&mut output)
            .map_err(|e| CacheError::Metadata(format!("Failed to write JPEG: {}", e)))?;
        Ok(output)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "EXIF (rexif + kamadak-exif)"
    }
}

fn record_from_exif(exif: &ExifData) -> ImageMetadataRecord {
    let mut record = ImageMetadataRecord {
        capture_time: extract_capture_time(exif),
        ..Default::default()
    };

    for entry in &exif.entries {
        match entry.tag {
            ExifTag::ExposureTime => {
                record.exposure_time = first_rational(&entry.value);
            }
            ExifTag::FNumber => {
                record.f_number = first_rational(&entry.value);
            }
            ExifTag::FocalLength => {
                // Unknown or zero focal lengths are reported as absent
                record.focal_length_mm = first_rational(&entry.value)
                    .and_then(|focal| focal.value())
                    .map(|mm| mm.round())
                    .filter(|mm| *mm >= 1.0 && *mm <= u32::MAX as f64)
                    .map(|mm| mm as u32);
            }
            ExifTag::Orientation => {
                if let TagValue::U16(values) = &entry.value
                    && let Some(code) = values.first()
                {
                    record.orientation = Orientation::from_exif(*code);
                }
            }
            _ => {}
        }
    }

    record
}

fn extract_capture_time(exif: &ExifData) -> Option<NaiveDateTime> {
    // Try different date fields in order of preference
    let date_fields = [
        ExifTag::DateTimeOriginal,
        ExifTag::DateTimeDigitized,
        ExifTag::DateTime,
    ];

    for field in &date_fields {
        if let Some(entry) = exif.entries.iter().find(|e| e.tag == *field) {
            let raw = match &entry.value {
                TagValue::Ascii(text) => text.trim_end_matches('\0').trim().to_string(),
                _ => entry.value_more_readable.trim().to_string(),
            };
            if let Some(time) = parse_exif_datetime(&raw) {
                debug!("Found capture date in {:?}: {}", field, time);
                return Some(time);
            }
        }
    }

    None
}

fn parse_exif_datetime(datetime_str: &str) -> Option<NaiveDateTime> {
    // EXIF datetime format: "2005:07:30 07:22:46"
    if let Ok(time) = NaiveDateTime::parse_from_str(datetime_str, EXIF_DATETIME_FORMAT) {
        return Some(time);
    }

    let formats = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(datetime_str, format).ok())
}

fn first_rational(value: &TagValue) -> Option<Rational> {
    match value {
        TagValue::URational(values) => values
            .first()
            .map(|r| Rational::new(r.numerator, r.denominator)),
        _ => None,
    }
}

/// Serialize the trimmed record as a TIFF/EXIF block. `None` when there is
/// nothing to write, leaving the artifact without any EXIF segment.
fn encode_exif(
    record: &ImageMetadataRecord,
    orientation_baked: bool,
) -> Result<Option<Vec<u8>>, CacheError> {
    use exif::experimental::Writer;
    use exif::{Field, In, Tag, Value};

    let rational = |r: Rational| exif::Rational {
        num: r.num,
        denom: r.denom,
    };

    let mut fields = Vec::new();
    if let Some(time) = record.capture_time {
        let formatted = time.format(EXIF_DATETIME_FORMAT).to_string();
        fields.push(Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![formatted.into_bytes()]),
        });
    }
    if let Some(focal) = record.focal_length_mm {
        fields.push(Field {
            tag: Tag::FocalLength,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![exif::Rational {
                num: focal,
                denom: 1,
            }]),
        });
    }
    if let Some(exposure) = record.exposure_time {
        fields.push(Field {
            tag: Tag::ExposureTime,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![rational(exposure)]),
        });
    }
    if let Some(f_number) = record.f_number {
        fields.push(Field {
            tag: Tag::FNumber,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![rational(f_number)]),
        });
    }
    if !orientation_baked && record.orientation != Orientation::None {
        fields.push(Field {
            tag: Tag::Orientation,
            ifd_num: In::PRIMARY,
            value: Value::Short(vec![record.orientation.to_exif()]),
        });
    }

    if fields.is_empty() {
        return Ok(None);
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }

    let mut buffer = std::io::Cursor::new(Vec::new());
    writer
        .write(&mut buffer, false)
        .map_err(|e| CacheError::Metadata(format!("Failed to encode EXIF: {}", e)))?;

    Ok(Some(buffer.into_inner()))
}
