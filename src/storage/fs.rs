//! Filesystem-backed mirror tree

use super::traits::{ResourceStore, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writes resources under a root directory on the local filesystem
///
/// Every file is written to a temporary file in its target directory and
/// renamed into place, so an interrupted mirror never leaves a partially
/// written resource behind.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens (creating if needed) a mirror tree rooted at `root`
    ///
    /// Existing contents are kept.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        if root.exists() && !root.is_dir() {
            return Err(StorageError::PathConflict { path: root });
        }
        fs::create_dir_all(&root).map_err(|e| StorageError::from_io(&root, e))?;

        Ok(Self { root })
    }

    /// Ensures every directory between the root and `dir` exists
    fn ensure_dir(&self, segments: &[&str]) -> StorageResult<PathBuf> {
        let mut dir = self.root.clone();
        for segment in segments {
            dir.push(segment);
            match fs::metadata(&dir) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => return Err(StorageError::PathConflict { path: dir }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if let Err(e) = fs::create_dir(&dir) {
                        // Another worker may have created it meanwhile
                        if !dir.is_dir() {
                            return Err(StorageError::from_io(&dir, e));
                        }
                    }
                }
                Err(e) => return Err(StorageError::from_io(&dir, e)),
            }
        }
        Ok(dir)
    }
}

/// Splits and checks a mirror-relative path
fn segments(local_path: &str) -> StorageResult<Vec<&str>> {
    if local_path.is_empty() || local_path.starts_with('/') {
        return Err(StorageError::InvalidPath(local_path.to_string()));
    }

    let segments: Vec<&str> = local_path.split('/').collect();
    let valid = segments
        .iter()
        .all(|s| !s.is_empty() && *s != "." && *s != ".." && !s.contains('\\') && !s.contains('\0'));

    if valid {
        Ok(segments)
    } else {
        Err(StorageError::InvalidPath(local_path.to_string()))
    }
}

impl ResourceStore for FsStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, local_path: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        let segments = segments(local_path)?;
        let (file_name, dirs) = segments
            .split_last()
            .ok_or_else(|| StorageError::InvalidPath(local_path.to_string()))?;

        let dir = self.ensure_dir(dirs)?;
        let target = dir.join(file_name);

        if target.is_dir() {
            return Err(StorageError::PathConflict { path: target });
        }

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| StorageError::from_io(&dir, e))?;
        temp.write_all(bytes)
            .and_then(|_| temp.flush())
            .map_err(|e| StorageError::from_io(&target, e))?;
        temp.persist(&target)
            .map_err(|e| StorageError::from_io(&target, e.error))?;

        tracing::trace!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(target)
    }
}
