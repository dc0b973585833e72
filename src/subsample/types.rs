use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::CacheError;

/// Enumerated picture variants. Every size except `Original` maps to a
/// bounding box and is generated into the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubsampleSize {
    Tiny,
    Lo,
    Hi,
    Original,
}

impl SubsampleSize {
    /// Sizes produced by the builder, smallest first.
    pub const GENERATED: [SubsampleSize; 3] =
        [SubsampleSize::Tiny, SubsampleSize::Lo, SubsampleSize::Hi];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubsampleSize::Tiny => "tiny",
            SubsampleSize::Lo => "lo",
            SubsampleSize::Hi => "hi",
            SubsampleSize::Original => "original",
        }
    }

    pub fn is_generated(&self) -> bool {
        !matches!(self, SubsampleSize::Original)
    }

    /// Only the largest variant keeps (trimmed) metadata.
    pub fn keeps_metadata(&self) -> bool {
        matches!(self, SubsampleSize::Hi)
    }
}

impl fmt::Display for SubsampleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubsampleSize {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiny" => Ok(SubsampleSize::Tiny),
            "lo" => Ok(SubsampleSize::Lo),
            "hi" => Ok(SubsampleSize::Hi),
            "original" => Ok(SubsampleSize::Original),
            other => Err(CacheError::UnknownSize(other.to_string())),
        }
    }
}

/// Maximum width and height of a generated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest dimensions that fit inside this box while keeping the aspect
    /// ratio of `width`x`height`. Never larger than the input.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.width && height <= self.height {
            return (width, height);
        }

        let ratio = f64::min(
            self.width as f64 / width as f64,
            self.height as f64 / height as f64,
        );
        // A zero-sized box still yields a 1x1 image rather than nothing
        let fitted_width = ((width as f64 * ratio).round() as u32).clamp(1, self.width.max(1));
        let fitted_height = ((height as f64 * ratio).round() as u32).clamp(1, self.height.max(1));
        (fitted_width, fitted_height)
    }
}

/// Hex digest identifying a logical picture inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-width prefix naming the shard directory.
    pub fn shard(&self) -> &str {
        &self.0[..super::store::SHARD_WIDTH]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an artifact lives, as computed from its key alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub shard_dir: PathBuf,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct SizeFailure {
    pub size: SubsampleSize,
    pub error: CacheError,
}

/// Outcome of one batch build: sizes that landed plus sizes that did not.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: BTreeMap<SubsampleSize, PathBuf>,
    pub failures: Vec<SizeFailure>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, size: SubsampleSize) -> Option<&CacheError> {
        self.failures
            .iter()
            .find(|failure| failure.size == size)
            .map(|failure| &failure.error)
    }

    /// Removes the failure recorded for `size`, if any.
    pub fn take_failure(&mut self, size: SubsampleSize) -> Option<CacheError> {
        let index = self.failures.iter().position(|failure| failure.size == size)?;
        Some(self.failures.remove(index).error)
    }
}

/// Result of comparing each requested size against its source.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Staleness {
    pub stale: Vec<SubsampleSize>,
    pub fresh: Vec<SubsampleSize>,
}

/// Counters reported by a pre-generation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PregenerateSummary {
    pub pictures: usize,
    pub built: usize,
    pub fresh: usize,
    pub failed: usize,
}
