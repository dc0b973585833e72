use super::metadata::ImageMetadataRecord;
use super::{
    BuildReport, CacheError, PregenerateSummary, SubsampleCache, SubsampleSize, derive_key,
    extension_of, walk_pictures,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Artifacts for one picture after a prepare pass.
#[derive(Debug, Default)]
pub struct Prepared {
    /// Sizes that were already up to date.
    pub fresh: BTreeMap<SubsampleSize, PathBuf>,
    /// What the builder did for the stale ones.
    pub report: BuildReport,
}

impl Prepared {
    pub fn path(&self, size: SubsampleSize) -> Option<&PathBuf> {
        self.fresh.get(&size).or_else(|| self.report.built.get(&size))
    }
}

impl SubsampleCache {
    /// Resolve `relative_path` at `size` to a file on disk, building the
    /// variant first when it is missing or older than its source.
    pub async fn locate_or_build(
        &self,
        relative_path: &str,
        size: &str,
    ) -> Result<PathBuf, CacheError> {
        // Size first: unknown sizes never touch the filesystem
        let size = self.parse_size(size)?;

        if size == SubsampleSize::Original {
            let source_path = self.source_path(relative_path);
            if !source_path.is_file() {
                return Err(CacheError::SourceMissing(source_path));
            }
            return Ok(source_path);
        }

        let mut prepared = self.prepare(relative_path, &[size], false).await?;
        if let Some(path) = prepared.path(size) {
            return Ok(path.clone());
        }

        Err(prepared.report.take_failure(size).unwrap_or_else(|| {
            CacheError::IoError(std::io::Error::other(format!(
                "{} variant of {} was not produced",
                size, relative_path
            )))
        }))
    }

    /// Bring `sizes` of one picture up to date, decoding the source at most
    /// once for all of them. With `force` every size is rebuilt.
    pub async fn prepare(
        &self,
        relative_path: &str,
        sizes: &[SubsampleSize],
        force: bool,
    ) -> Result<Prepared, CacheError> {
        for size in sizes {
            self.builder.bounds(*size)?;
        }

        let source_path = self.source_path(relative_path);
        if !source_path.is_file() {
            return Err(CacheError::SourceMissing(source_path));
        }

        let key = derive_key(relative_path);
        let source_ext = extension_of(relative_path);
        let requested: Vec<(SubsampleSize, PathBuf)> = sizes
            .iter()
            .map(|size| (*size, self.store.locate(&key, *size, source_ext).path))
            .collect();

        let mut staleness = self.oracle.partition(&source_path, &requested, force)?;
        if staleness.stale.is_empty() {
            debug!("Cache hit for {} ({} sizes)", relative_path, requested.len());
            return Ok(prepared_from(&requested, &staleness.fresh, BuildReport::default()));
        }

        let _guard = self.locks.acquire(&key).await;

        // Whoever held the lock before us may have built some of them
        if !force {
            staleness = self.oracle.partition(&source_path, &requested, false)?;
            if staleness.stale.is_empty() {
                debug!("Built concurrently: {}", relative_path);
                return Ok(prepared_from(&requested, &staleness.fresh, BuildReport::default()));
            }
        }

        debug!("Building {:?} for {}", staleness.stale, relative_path);
        let builder = self.builder.clone();
        let stale = staleness.stale.clone();
        let report = tokio::task::spawn_blocking(move || builder.build(&source_path, &key, &stale))
            .await
            .map_err(std::io::Error::from)??;

        Ok(prepared_from(&requested, &staleness.fresh, report))
    }

    /// Walk the pictures root and bring every generated size of every picture
    /// up to date.
    pub async fn pregenerate(&self, force: bool) -> PregenerateSummary {
        let source_directory = self.config.source_directory.clone();
        let pictures = match tokio::task::spawn_blocking(move || walk_pictures(&source_directory))
            .await
        {
            Ok(pictures) => pictures,
            Err(e) => {
                error!("Failed to scan pictures: {}", e);
                return PregenerateSummary::default();
            }
        };

        info!(
            "Pre-generating subsamples for {} pictures{}",
            pictures.len(),
            if force { " (forced)" } else { "" }
        );

        let mut summary = PregenerateSummary {
            pictures: pictures.len(),
            ..Default::default()
        };

        for (index, relative_path) in pictures.iter().enumerate() {
            match self
                .prepare(relative_path, &SubsampleSize::GENERATED, force)
                .await
            {
                Ok(prepared) => {
                    summary.fresh += prepared.fresh.len();
                    summary.built += prepared.report.built.len();
                    summary.failed += prepared.report.failures.len();
                }
                Err(e) => {
                    warn!("Skipping {}: {}", relative_path, e);
                    summary.failed += SubsampleSize::GENERATED.len();
                }
            }

            if (index + 1) % 100 == 0 {
                info!("Pre-generation progress: {}/{}", index + 1, pictures.len());
            }
        }

        info!(
            "Pre-generation complete: {} built, {} fresh, {} failed",
            summary.built, summary.fresh, summary.failed
        );
        summary
    }

    /// Metadata record of a source picture, read fresh from the file.
    pub async fn picture_metadata(
        &self,
        relative_path: &str,
    ) -> Result<ImageMetadataRecord, CacheError> {
        let source_path = self.source_path(relative_path);
        let source = match tokio::fs::read(&source_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::SourceMissing(source_path));
            }
            Err(e) => return Err(e.into()),
        };

        let transcoder = self.transcoder.clone();
        let record = tokio::task::spawn_blocking(move || transcoder.extract(&source))
            .await
            .map_err(std::io::Error::from)?;
        Ok(record)
    }
}

fn prepared_from(
    requested: &[(SubsampleSize, PathBuf)],
    fresh: &[SubsampleSize],
    report: BuildReport,
) -> Prepared {
    let fresh = requested
        .iter()
        .filter(|(size, _)| fresh.contains(size))
        .cloned()
        .collect();
    Prepared { fresh, report }
}
