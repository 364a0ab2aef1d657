//! Storage traits and error types
//!
//! This module defines the trait interface for mirror tree backends and
//! associated error types.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing the mirror tree
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file occupies a path that must be a directory, or the reverse
    #[error("Path conflict at {path}")]
    PathConflict { path: PathBuf },

    #[error("Invalid local path: {0}")]
    InvalidPath(String),

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Classifies an IO error raised while touching `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for mirror tree backends
///
/// Implementations must be usable from several worker tasks at once; distinct
/// local paths never collide because the crawl state assigns each path once.
pub trait ResourceStore: Send + Sync {
    /// Directory the mirror tree is rooted at
    fn root(&self) -> &Path;

    /// Writes `bytes` at the mirror-relative `local_path`
    ///
    /// Creates parent directories as needed and replaces an existing file.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Full path of the written file
    /// * `Err(StorageError::PathConflict)` - A path segment is occupied by a
    ///   file, or the target is a directory
    fn write(&self, local_path: &str, bytes: &[u8]) -> StorageResult<PathBuf>;

    /// Full path a mirror-relative path maps to
    fn resolve(&self, local_path: &str) -> PathBuf {
        local_path
            .split('/')
            .fold(self.root().to_path_buf(), |path, segment| path.join(segment))
    }
}
