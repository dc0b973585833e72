use super::{CacheError, ShardedStore, Staleness, SubsampleSize};
use std::path::{Path, PathBuf};

/// Decides which artifacts must be (re)built by comparing modification
/// times. Filesystem timestamps are coarse, so a source rewritten within the
/// same tick as its artifact may go unnoticed.
#[derive(Debug, Clone)]
pub struct StalenessOracle {
    store: ShardedStore,
}

impl StalenessOracle {
    pub fn new(store: ShardedStore) -> Self {
        Self { store }
    }

    pub fn needs_build(&self, source_path: &Path, artifact_path: &Path) -> Result<bool, CacheError> {
        if !self.store.exists(artifact_path) {
            return Ok(true);
        }

        let source_modified = match self.store.mod_time(source_path) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::SourceMissing(source_path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        match self.store.mod_time(artifact_path) {
            Ok(artifact_modified) => Ok(artifact_modified < source_modified),
            // Vanished between the two checks
            Err(_) => Ok(true),
        }
    }

    /// Split requested sizes into stale and fresh. With `force` every size is
    /// stale regardless of timestamps.
    pub fn partition(
        &self,
        source_path: &Path,
        requested: &[(SubsampleSize, PathBuf)],
        force: bool,
    ) -> Result<Staleness, CacheError> {
        let mut staleness = Staleness::default();

        for (size, artifact_path) in requested {
            if force || self.needs_build(source_path, artifact_path)? {
                staleness.stale.push(*size);
            } else {
                staleness.fresh.push(*size);
            }
        }

        Ok(staleness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_modified(time)).unwrap();
    }

    fn setup() -> (TempDir, StalenessOracle, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.jpg");
        let artifact = temp_dir.path().join("artifact.hi.jpg");
        std::fs::write(&source, b"source").unwrap();
        let oracle = StalenessOracle::new(ShardedStore::new(temp_dir.path()));
        (temp_dir, oracle, source, artifact)
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let (_temp_dir, oracle, source, artifact) = setup();
        assert!(oracle.needs_build(&source, &artifact).unwrap());
    }

    #[test]
    fn test_staleness_monotonicity() {
        let (_temp_dir, oracle, source, artifact) = setup();
        std::fs::write(&artifact, b"artifact").unwrap();

        let base = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&source, base);
        set_mtime(&artifact, base + Duration::from_secs(60));
        assert!(!oracle.needs_build(&source, &artifact).unwrap());

        // Touch the source to a strictly later time
        set_mtime(&source, base + Duration::from_secs(120));
        assert!(oracle.needs_build(&source, &artifact).unwrap());
    }

    #[test]
    fn test_equal_timestamps_are_fresh() {
        let (_temp_dir, oracle, source, artifact) = setup();
        std::fs::write(&artifact, b"artifact").unwrap();

        let time = SystemTime::now() - Duration::from_secs(600);
        set_mtime(&source, time);
        set_mtime(&artifact, time);
        assert!(!oracle.needs_build(&source, &artifact).unwrap());
    }

    #[test]
    fn test_missing_source_with_artifact() {
        let (temp_dir, oracle, _source, artifact) = setup();
        std::fs::write(&artifact, b"artifact").unwrap();

        let gone = temp_dir.path().join("gone.jpg");
        match oracle.needs_build(&gone, &artifact) {
            Err(CacheError::SourceMissing(path)) => assert_eq!(path, gone),
            other => panic!("Expected SourceMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_partition_and_force() {
        let (temp_dir, oracle, source, artifact) = setup();
        std::fs::write(&artifact, b"artifact").unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&source, base);
        set_mtime(&artifact, base + Duration::from_secs(1));

        let requested = vec![
            (SubsampleSize::Tiny, temp_dir.path().join("artifact.tiny.jpg")),
            (SubsampleSize::Hi, artifact.clone()),
        ];

        let staleness = oracle.partition(&source, &requested, false).unwrap();
        assert_eq!(staleness.stale, vec![SubsampleSize::Tiny]);
        assert_eq!(staleness.fresh, vec![SubsampleSize::Hi]);

        let forced = oracle.partition(&source, &requested, true).unwrap();
        assert_eq!(forced.stale, vec![SubsampleSize::Tiny, SubsampleSize::Hi]);
        assert!(forced.fresh.is_empty());
    }
}
