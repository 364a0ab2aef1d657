//! Site-Mirror: an offline website mirroring engine
//!
//! This crate fetches a root page together with the stylesheets, scripts,
//! images, fonts and (optionally) linked pages it references, saves them under
//! a local directory, and rewrites references so the saved copy can be browsed
//! offline.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> site_mirror::Result<()> {
//! let result = site_mirror::mirror("https://example.com/", None, false).await?;
//! println!("Saved to: {}", result.index_file.display());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Main error type for mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch root document {url}: {source}")]
    RootFetchFailed { url: String, source: FetchError },

    #[error("Mirror of {url} was cancelled before the root document completed")]
    Cancelled { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid state transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: state::ResourceState,
        to: state::ResourceState,
    },

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UrlError> for MirrorError {
    fn from(err: UrlError) -> Self {
        MirrorError::InvalidInput(err.to_string())
    }
}

/// Per-resource fetch failures
///
/// These are recorded against the resource and never abort a mirror, except
/// when they hit the root document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Too many redirects ({hops} hops)")]
    TooManyRedirects { hops: usize },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true for transient failures worth another attempt
    ///
    /// Timeouts, connection failures, interrupted bodies and 5xx responses are
    /// retried. Client errors (4xx), bad URLs and redirect problems are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) | Self::Request(_) => true,
            Self::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, MirrorJob};
pub use output::MirrorResult;
pub use state::{ResourceKind, ResourceRecord, ResourceState};
pub use crate::url::{canonicalize, normalize_url};

/// Mirrors `url` into `save_dir` using the default configuration
///
/// When `save_dir` is `None` the configured default (`mirror`) is used. The
/// directory is created if missing; existing files are overwritten one by one
/// but never purged. When `open_browser` is set the entry file is handed to
/// the system browser once the mirror completes; a launch failure is logged
/// and reported on the result, it does not fail the call.
///
/// # Errors
///
/// * `MirrorError::InvalidInput` - `url` is not an absolute HTTP(S) URL
/// * `MirrorError::RootFetchFailed` - the root document could not be fetched
/// * `MirrorError::Storage` - the mirror tree could not be written
pub async fn mirror(url: &str, save_dir: Option<&Path>, open_browser: bool) -> Result<MirrorResult> {
    let mut config = Config::default();
    if let Some(dir) = save_dir {
        config.output.save_dir = dir.to_string_lossy().into_owned();
    }

    mirror_with_config(url, &config, open_browser, CancellationToken::new()).await
}

/// Mirrors `url` with an explicit configuration and cancellation token
///
/// Cancelling `cancel` stops new work from being dispatched, lets in-flight
/// fetches finish, and returns a partial result with the remaining resources
/// marked as cancelled.
pub async fn mirror_with_config(
    url: &str,
    config: &Config,
    open_browser: bool,
    cancel: CancellationToken,
) -> Result<MirrorResult> {
    let job = MirrorJob::new(url, config)?;
    let coordinator = Coordinator::new(job, config)?.with_cancellation(cancel);

    let mut result = coordinator.run().await?;

    if open_browser {
        if let Err(e) = browser::open_in_browser(&result.index_file) {
            tracing::warn!(
                "Failed to open {} in browser: {}",
                result.index_file.display(),
                e
            );
            result.browser_error = Some(e.to_string());
        }
    }

    Ok(result)
}
