//! Statistics over a finished mirror

use crate::output::MirrorResult;
use crate::state::{ResourceKind, ResourceState};
use std::collections::BTreeMap;

/// Aggregated counts derived from a `MirrorResult`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStatistics {
    /// Total recorded resources
    pub total: usize,

    /// Fetched resources by kind
    pub fetched_by_kind: BTreeMap<&'static str, usize>,

    /// Skipped resources by reason
    pub skipped_by_reason: BTreeMap<&'static str, usize>,

    /// Hosts with at least one fetched resource other than the root host
    pub foreign_hosts: Vec<String>,
}

impl MirrorStatistics {
    /// Collects statistics from a result
    pub fn from_result(result: &MirrorResult) -> Self {
        let mut stats = Self {
            total: result.resources.len(),
            ..Self::default()
        };

        let root_host = url::Url::parse(&result.root_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        for resource in &result.resources {
            if let ResourceState::Fetched = resource.state {
                *stats
                    .fetched_by_kind
                    .entry(resource.kind.as_str())
                    .or_insert(0) += 1;

                let host = url::Url::parse(&resource.url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string));
                if let Some(host) = host {
                    if Some(&host) != root_host.as_ref() && !stats.foreign_hosts.contains(&host) {
                        stats.foreign_hosts.push(host);
                    }
                }
            }
        }

        for skipped in &result.skipped {
            *stats
                .skipped_by_reason
                .entry(skipped.reason.as_str())
                .or_insert(0) += 1;
        }

        stats.foreign_hosts.sort();
        stats
    }

    /// Number of fetched resources of one kind
    pub fn fetched_of(&self, kind: ResourceKind) -> usize {
        self.fetched_by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// Prints a summary of a finished mirror to stdout
///
/// # Arguments
///
/// * `result` - The mirror result to summarize
pub fn print_summary(result: &MirrorResult) {
    let stats = MirrorStatistics::from_result(result);

    println!("=== Mirror Summary ===\n");

    println!("Overview:");
    println!("  Root URL: {}", result.root_url);
    if let Some(title) = &result.title {
        println!("  Title: {}", title);
    }
    println!("  Entry file: {}", result.index_file.display());
    println!(
        "  Duration: {:.2}s",
        result.duration().num_milliseconds() as f64 / 1000.0
    );
    if result.cancelled {
        println!("  Status: cancelled (partial mirror)");
    }
    println!();

    println!("Resources:");
    println!("  Recorded: {}", stats.total);
    println!("  Fetched: {}", result.fetched_count());
    println!("  Failed: {}", result.failed_count());
    println!("  Skipped: {}", result.skipped_count());
    println!("  Bytes written: {}", result.bytes_written);
    println!();

    if !stats.fetched_by_kind.is_empty() {
        println!("Fetched by Kind:");
        for (kind, count) in &stats.fetched_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !stats.skipped_by_reason.is_empty() {
        println!("Skipped by Reason:");
        for (reason, count) in &stats.skipped_by_reason {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if !stats.foreign_hosts.is_empty() {
        println!("Mirrored Foreign Hosts:");
        for host in &stats.foreign_hosts {
            println!("  - {}", host);
        }
        println!();
    }

    if !result.failed.is_empty() {
        println!("Failures:");
        for failure in result.failed.iter().take(20) {
            println!("  {} ({})", failure.url, failure.reason);
        }
        if result.failed.len() > 20 {
            println!("  ... and {} more", result.failed.len() - 20);
        }
        println!();
    }

    if let Some(err) = &result.browser_error {
        println!("Browser launch failed: {}", err);
    }
}
