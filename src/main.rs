//! Site-Mirror main entry point
//!
//! This is the command-line interface for the Site-Mirror offline mirroring engine.

use anyhow::{Context, Result};
use clap::Parser;
use site_mirror::config::{load_config, validate, Config};
use site_mirror::output::{generate_markdown_report, print_summary};
use site_mirror::{mirror_with_config, MirrorJob};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Mirror: save a web page and its resources for offline browsing
///
/// Fetches the page at URL together with the stylesheets, scripts, images and
/// fonts it references, writes them under the output directory and rewrites
/// references so the copy works offline.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version)]
#[command(about = "Mirror a web page for offline browsing", long_about = None)]
struct Cli {
    /// Absolute HTTP(S) URL of the page to mirror
    #[arg(value_name = "URL")]
    url: String,

    /// Directory to write the mirror into
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Open the entry file in the default browser when done
    #[arg(long)]
    open: bool,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of resources processed concurrently
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Mirror resources from every host, not only the root's origin
    #[arg(long)]
    cross_origin: bool,

    /// Hyperlink hops to follow from the root page
    #[arg(long, value_name = "N")]
    max_page_depth: Option<u32>,

    /// Cancel the job after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write a Markdown report of the mirror to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Validate input and configuration without fetching anything
    #[arg(long, conflicts_with_all = ["open", "report"])]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    if cli.dry_run {
        return handle_dry_run(&cli.url, &config);
    }

    handle_mirror(&cli, &config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,warn"),
            1 => EnvFilter::new("site_mirror=debug,info"),
            2 => EnvFilter::new("site_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(dir) = &cli.output {
        config.output.save_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(concurrency) = cli.concurrency {
        config.mirror.concurrency = concurrency;
    }
    if cli.cross_origin {
        config.scope.cross_origin = true;
    }
    if let Some(depth) = cli.max_page_depth {
        config.mirror.max_page_depth = depth;
    }
    if let Some(secs) = cli.timeout {
        config.mirror.job_timeout_secs = secs;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates input and shows what would be mirrored
fn handle_dry_run(url: &str, config: &Config) -> Result<()> {
    let job = MirrorJob::new(url, config)?;

    println!("=== Site-Mirror Dry Run ===\n");

    println!("Job:");
    println!("  Root URL: {}", job.root_url);
    println!("  Save directory: {}", job.save_dir.display());
    println!("  Entry file: {}", job.entry_file);
    println!("  Concurrency: {}", job.concurrency);
    println!("  Max resources: {}", job.max_resources);
    println!("  Max page depth: {}", job.max_page_depth);
    match job.timeout {
        Some(timeout) => println!("  Job timeout: {}s", timeout.as_secs()),
        None => println!("  Job timeout: none"),
    }

    println!("\nScope:");
    if job.scope.cross_origin {
        println!("  Cross-origin: all hosts mirrored");
    } else {
        println!("  Same origin as the root only");
    }
    for pattern in &job.scope.allowed_hosts {
        println!("  + {}", pattern);
    }

    println!("\nFetch:");
    println!("  User-Agent: {}", config.fetch.user_agent());
    println!("  Attempts: {}", config.fetch.max_attempts);
    println!("  Request timeout: {}s", config.fetch.request_timeout_secs);
    println!("  Max redirects: {}", config.fetch.max_redirects);

    println!("\n✓ Input and configuration are valid");

    Ok(())
}

/// Handles the main mirror operation
async fn handle_mirror(cli: &Cli, config: &Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight resources");
            signal_token.cancel();
        }
    });

    let result = match mirror_with_config(&cli.url, config, cli.open, cancel).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            return Err(e.into());
        }
    };

    if !cli.quiet {
        print_summary(&result);
    }

    if let Some(path) = &cli.report {
        generate_markdown_report(&result, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("✓ Report written to: {}", path.display());
    }

    println!("{}", result.index_file.display());

    Ok(())
}
