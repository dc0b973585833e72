use chrono::NaiveDateTime;
use image::DynamicImage;
use serde::Serialize;
use std::fmt;

/// Rotation needed to bring decoded pixels upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation code. Mirrored variants are not rotations and
    /// are left alone.
    pub fn from_exif(code: u16) -> Self {
        match code {
            6 => Orientation::Rotate90,
            3 => Orientation::Rotate180,
            8 => Orientation::Rotate270,
            _ => Orientation::None,
        }
    }

    pub fn to_exif(self) -> u16 {
        match self {
            Orientation::None => 1,
            Orientation::Rotate90 => 6,
            Orientation::Rotate180 => 3,
            Orientation::Rotate270 => 8,
        }
    }

    /// Rotate clockwise by the stored amount.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::None => image,
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }
}

/// Unsigned EXIF rational, kept exactly as the camera wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub denom: u32,
}

impl Rational {
    pub fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    pub fn value(&self) -> Option<f64> {
        if self.denom == 0 {
            None
        } else {
            Some(self.num as f64 / self.denom as f64)
        }
    }

    fn reduced(&self) -> Rational {
        let divisor = gcd(self.num, self.denom);
        if divisor <= 1 {
            *self
        } else {
            Rational::new(self.num / divisor, self.denom / divisor)
        }
    }
}

impl fmt::Display for Rational {
    /// Fraction form in lowest terms: `1/250`, or `2` for whole numbers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reduced = self.reduced();
        if reduced.denom == 1 {
            write!(f, "{}", reduced.num)
        } else {
            write!(f, "{}/{}", reduced.num, reduced.denom)
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// The subset of embedded metadata the gallery cares about. Only ever read
/// fresh from a source or written fresh into an artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadataRecord {
    pub capture_time: Option<NaiveDateTime>,
    pub exposure_time: Option<Rational>,
    pub f_number: Option<Rational>,
    pub focal_length_mm: Option<u32>,
    pub orientation: Orientation,
}

/// Blank-on-absence strings for listing and detail pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayMetadata {
    pub time: String,
    pub focal: String,
    pub expo: String,
    pub fnumber: String,
}

impl ImageMetadataRecord {
    pub fn is_empty(&self) -> bool {
        self.capture_time.is_none()
            && self.exposure_time.is_none()
            && self.f_number.is_none()
            && self.focal_length_mm.is_none()
            && self.orientation == Orientation::None
    }

    /// Fields carried over to the largest variant. Orientation is dropped
    /// because artifacts are stored upright.
    pub fn trimmed(&self) -> ImageMetadataRecord {
        ImageMetadataRecord {
            capture_time: self.capture_time,
            exposure_time: self.exposure_time,
            f_number: self.f_number,
            focal_length_mm: self.focal_length_mm,
            orientation: Orientation::None,
        }
    }

    /// Interpreted f-number as cameras print it, e.g. `F2.8`.
    pub fn f_number_interpreted(&self) -> Option<String> {
        let value = self.f_number?.value()?;
        Some(format!("F{}", format_aperture(value)))
    }

    /// F-number in viewer convention, e.g. `f/2.8`.
    pub fn f_number_label(&self) -> Option<String> {
        self.f_number_interpreted()
            .map(|interpreted| interpreted.replacen('F', "f/", 1))
    }

    pub fn display(&self) -> DisplayMetadata {
        DisplayMetadata {
            time: self
                .capture_time
                .map(|time| time.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            focal: self
                .focal_length_mm
                .map(|focal| focal.to_string())
                .unwrap_or_default(),
            expo: self
                .exposure_time
                .map(|expo| expo.to_string())
                .unwrap_or_default(),
            fnumber: self
                .f_number_interpreted()
                .map(|interpreted| interpreted.replace('F', ""))
                .unwrap_or_default(),
        }
    }

    /// One-line caption used under thumbnails:
    /// `f/2.8  1/250s  35mm  @  01/06/2021`, skipping absent parts.
    pub fn title(&self) -> String {
        let display = self.display();
        let mut title = String::new();

        if !display.fnumber.is_empty() {
            title.push_str(&format!("f/{}", display.fnumber));
        }
        if !display.expo.is_empty() {
            title.push_str(&format!("  {}s", display.expo));
        }
        if !display.focal.is_empty() {
            title.push_str(&format!("  {}mm", display.focal));
        }
        if !display.time.is_empty() {
            title.push_str(&format!("  @  {}", display.time));
        }

        title
    }
}

/// Two significant digits, the way apertures are engraved: 1.4, 2.8, 4, 11.
fn format_aperture(value: f64) -> String {
    if value >= 10.0 {
        format!("{:.0}", value)
    } else {
        let rounded = format!("{:.1}", value);
        rounded.strip_suffix(".0").unwrap_or(&rounded).to_string()
    }
}
