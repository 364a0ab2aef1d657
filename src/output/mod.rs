//! Output module for mirror results and reports
//!
//! This module handles:
//! - The `MirrorResult` returned by a finished job
//! - Printing a summary to the terminal
//! - Writing a Markdown report

mod markdown;
mod result;
pub mod stats;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use result::{FailedResource, MirrorResult, ResourceSummary, SkippedResource};
pub use stats::{print_summary, MirrorStatistics};

use thiserror::Error;

/// Output-specific errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
