//! Markdown report generation
//!
//! Writes a human-readable report of a finished mirror: overview, resource
//! counts, failures and skipped references.

use crate::output::stats::MirrorStatistics;
use crate::output::{MirrorResult, OutputError, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of a mirror to `output_path`
///
/// # Arguments
///
/// * `result` - The finished mirror
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(result: &MirrorResult, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(result);

    let mut file = File::create(output_path).map_err(|e| {
        OutputError::Write(format!("{}: {}", output_path.display(), e))
    })?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a mirror result as markdown
pub fn format_markdown_report(result: &MirrorResult) -> String {
    let stats = MirrorStatistics::from_result(result);
    let mut md = String::new();

    md.push_str("# Site Mirror Report\n\n");

    md.push_str("## Overview\n\n");
    md.push_str(&format!("- **Root URL**: {}\n", result.root_url));
    if let Some(title) = &result.title {
        md.push_str(&format!("- **Title**: {}\n", escape_cell(title)));
    }
    md.push_str(&format!(
        "- **Entry File**: `{}`\n",
        result.index_file.display()
    ));
    md.push_str(&format!("- **Started**: {}\n", result.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        result.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        result.duration().num_milliseconds() as f64 / 1000.0
    ));
    let status = if result.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    md.push_str(&format!("- **Status**: {}\n\n", status));

    md.push_str("## Resources\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Recorded | {} |\n", stats.total));
    md.push_str(&format!("| Fetched | {} |\n", result.fetched_count()));
    md.push_str(&format!("| Failed | {} |\n", result.failed_count()));
    md.push_str(&format!("| Skipped | {} |\n\n", result.skipped_count()));
    md.push_str(&format!(
        "Bytes written: {}\n\n",
        result.bytes_written
    ));

    if !stats.fetched_by_kind.is_empty() {
        md.push_str("### Fetched by Kind\n\n");
        for (kind, count) in &stats.fetched_by_kind {
            md.push_str(&format!("- {}: {}\n", kind, count));
        }
        md.push('\n');
    }

    if !stats.foreign_hosts.is_empty() {
        md.push_str("### Mirrored Foreign Hosts\n\n");
        for host in &stats.foreign_hosts {
            md.push_str(&format!("- {}\n", host));
        }
        md.push('\n');
    }

    if !result.failed.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for failure in &result.failed {
            md.push_str(&format!(
                "| {} | {} |\n",
                escape_cell(&failure.url),
                escape_cell(&failure.reason.to_string())
            ));
        }
        md.push('\n');
    }

    if !result.skipped.is_empty() {
        md.push_str("## Skipped\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for skipped in &result.skipped {
            md.push_str(&format!(
                "| {} | {} |\n",
                escape_cell(&skipped.url),
                skipped.reason
            ));
        }
        md.push('\n');
    }

    md
}

/// Escapes pipe characters so a value stays inside its table cell
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{FailedResource, SkippedResource};
    use crate::state::{FailureReason, SkipReason};
    use crate::FetchError;
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_result() -> MirrorResult {
        let now = Utc::now();
        MirrorResult {
            root_url: "https://example.com/".to_string(),
            save_dir: PathBuf::from("mirror"),
            index_file: PathBuf::from("mirror/index.html"),
            title: Some("Example | Home".to_string()),
            fetched: 2,
            failed: vec![FailedResource {
                url: "https://example.com/missing.png".to_string(),
                reason: FailureReason::Fetch(FetchError::Status(404)),
            }],
            skipped: vec![SkippedResource {
                url: "https://cdn.other.com/logo.png".to_string(),
                reason: SkipReason::OutOfScope,
            }],
            resources: vec![],
            bytes_written: 1234,
            started_at: now,
            finished_at: now,
            cancelled: false,
            browser_error: None,
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let md = format_markdown_report(&sample_result());

        assert!(md.starts_with("# Site Mirror Report"));
        assert!(md.contains("- **Root URL**: https://example.com/"));
        assert!(md.contains("- **Title**: Example \\| Home"));
        assert!(md.contains("| Failed | 1 |"));
        assert!(md.contains("| https://example.com/missing.png | HTTP status 404 |"));
        assert!(md.contains("| https://cdn.other.com/logo.png | out_of_scope |"));
        assert!(md.contains("- **Status**: complete"));
    }

    #[test]
    fn test_generate_markdown_report_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");

        generate_markdown_report(&sample_result(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## Failures"));
        assert!(content.contains("## Skipped"));
    }
}
