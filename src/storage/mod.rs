//! Storage module for persisting the mirror tree
//!
//! This module handles every filesystem write of a mirror job:
//! - Creating the save directory and nested resource directories
//! - Atomic per-file writes (temporary file + rename)
//! - Detecting file/directory conflicts in the tree

mod fs;
mod traits;

pub use fs::FsStore;
pub use traits::{ResourceStore, StorageError, StorageResult};
