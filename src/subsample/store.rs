use super::{ArtifactLocation, CacheError, CacheKey, SubsampleSize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Number of leading key characters used as the shard directory name.
pub(crate) const SHARD_WIDTH: usize = 2;

/// Artifact store laid out as `<root>/<shard>/<key>.<size>.<ext>`.
///
/// The directory tree is the only index: an artifact is located from its key
/// without listing anything, and deleting a file evicts exactly that entry.
#[derive(Debug, Clone)]
pub struct ShardedStore {
    root: PathBuf,
}

impl ShardedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locate(&self, key: &CacheKey, size: SubsampleSize, source_ext: &str) -> ArtifactLocation {
        let shard_dir = self.root.join(key.shard());
        let ext = source_ext.trim_start_matches('.').to_lowercase();
        let file_name = format!("{}.{}.{}", key, size, ext);
        let path = shard_dir.join(&file_name);

        ArtifactLocation {
            shard_dir,
            file_name,
            path,
        }
    }

    /// Create the shard directory if it is missing. Losing a creation race to
    /// another worker is not an error.
    pub fn ensure_shard(&self, shard_dir: &Path) -> Result<(), CacheError> {
        match std::fs::create_dir_all(shard_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && shard_dir.is_dir() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    pub fn mod_time(&self, path: &Path) -> std::io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    /// Replace `path` with `bytes` atomically: readers see either the previous
    /// artifact or the complete new one, never a partial write.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let parent = path.parent().ok_or(CacheError::InvalidPath)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(CacheError::InvalidPath)?;
        let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let written = std::fs::File::create(&tmp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });

        let result = written.and_then(|()| std::fs::rename(&tmp_path, path));
        if let Err(e) = result {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Failed to remove temporary file {:?}: {}", tmp_path, cleanup);
            }
            return Err(e.into());
        }

        debug!("Stored {} bytes at {:?}", bytes.len(), path);
        Ok(())
    }
}
