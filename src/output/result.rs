//! The result of a finished mirror job

use crate::state::{FailureReason, ResourceKind, ResourceRecord, ResourceState, SkipReason};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A resource that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResource {
    pub url: String,
    pub reason: FailureReason,
}

/// A resource that was recorded but not fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedResource {
    pub url: String,
    pub reason: SkipReason,
}

/// Final state of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSummary {
    pub url: String,
    pub kind: ResourceKind,
    pub local_path: Option<String>,
    pub state: ResourceState,
    pub bytes_written: Option<u64>,
}

/// Outcome of a mirror job
///
/// Created once when the job completes and never modified afterwards, except
/// for `browser_error` which is filled in by the caller that launched it.
#[derive(Debug, Clone)]
pub struct MirrorResult {
    /// Canonical root URL
    pub root_url: String,

    /// Directory the mirror tree is rooted at
    pub save_dir: PathBuf,

    /// Local file of the root document
    pub index_file: PathBuf,

    /// Title of the root document
    pub title: Option<String>,

    /// Number of resources fetched and written
    pub fetched: usize,

    /// Failed resources with their reasons, in discovery order
    pub failed: Vec<FailedResource>,

    /// Skipped resources with their reasons, in discovery order
    pub skipped: Vec<SkippedResource>,

    /// Every recorded resource, in discovery order
    pub resources: Vec<ResourceSummary>,

    /// Total bytes written to the mirror tree
    pub bytes_written: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// The job was cancelled (or timed out) before the queue drained
    pub cancelled: bool,

    /// Set when the entry file could not be opened in a browser
    pub browser_error: Option<String>,
}

impl MirrorResult {
    /// Builds the result from the final records of a job
    ///
    /// # Arguments
    ///
    /// * `root` - The root record
    /// * `save_dir` - Mirror root directory
    /// * `index_file` - Full path of the root's local file
    /// * `records` - Every record, in discovery order
    /// * `started_at` - When the job started
    /// * `cancelled` - Whether the job was cancelled
    pub fn from_records(
        root: &ResourceRecord,
        save_dir: PathBuf,
        index_file: PathBuf,
        records: &[ResourceRecord],
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> Self {
        let mut fetched = 0;
        let mut bytes_written = 0;
        let mut failed = Vec::new();
        let mut skipped = Vec::new();

        for record in records {
            match &record.state {
                ResourceState::Fetched => {
                    fetched += 1;
                    bytes_written += record.bytes_written.unwrap_or(0);
                }
                ResourceState::Failed(reason) => failed.push(FailedResource {
                    url: record.url.to_string(),
                    reason: reason.clone(),
                }),
                ResourceState::Skipped(reason) => skipped.push(SkippedResource {
                    url: record.url.to_string(),
                    reason: *reason,
                }),
                ResourceState::Pending | ResourceState::Fetching => {}
            }
        }

        let resources = records
            .iter()
            .map(|record| ResourceSummary {
                url: record.url.to_string(),
                kind: record.kind,
                local_path: record.local_path.clone(),
                state: record.state.clone(),
                bytes_written: record.bytes_written,
            })
            .collect();

        Self {
            root_url: root.url.to_string(),
            save_dir,
            index_file,
            title: root.title.clone(),
            fetched,
            failed,
            skipped,
            resources,
            bytes_written,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            browser_error: None,
        }
    }

    pub fn fetched_count(&self) -> usize {
        self.fetched
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Failed resources that were cancelled rather than fetched
    pub fn cancelled_count(&self) -> usize {
        self.failed
            .iter()
            .filter(|f| f.reason == FailureReason::Cancelled)
            .count()
    }

    /// Wall-clock duration of the job
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Looks up the local path assigned to a canonical URL
    pub fn local_path_of(&self, url: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.url == url)
            .and_then(|r| r.local_path.as_deref())
    }
}
