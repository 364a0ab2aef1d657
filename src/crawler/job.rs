//! Description of a single mirror job

use crate::config::{validate, Config};
use crate::url::{normalize_url, ScopePolicy};
use crate::{MirrorError, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Everything a mirror run needs to know up front
///
/// Created once per mirror call and never modified afterwards.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    /// Canonical root URL
    pub root_url: Url,

    /// Directory the mirror tree is rooted at
    pub save_dir: PathBuf,

    pub scope: ScopePolicy,

    /// Worker pool size
    pub concurrency: usize,

    pub max_resources: u32,
    pub max_page_depth: u32,

    /// Local file name of the root document
    pub entry_file: String,

    /// Whole-job timeout, if any
    pub timeout: Option<Duration>,
}

impl MirrorJob {
    /// Validates `url` and `config` and builds the job
    ///
    /// No network or filesystem activity happens here.
    ///
    /// # Errors
    ///
    /// * `MirrorError::InvalidInput` - `url` is not an absolute HTTP(S) URL
    /// * `MirrorError::Config` - `config` fails validation
    pub fn new(url: &str, config: &Config) -> Result<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(MirrorError::InvalidInput("URL is empty".to_string()));
        }

        let root_url = normalize_url(trimmed)
            .map_err(|e| MirrorError::InvalidInput(format!("{}: {}", trimmed, e)))?;

        validate(config)?;

        let timeout = match config.mirror.job_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            root_url,
            save_dir: PathBuf::from(&config.output.save_dir),
            scope: ScopePolicy::from(&config.scope),
            concurrency: config.mirror.concurrency.max(1) as usize,
            max_resources: config.mirror.max_resources,
            max_page_depth: config.mirror.max_page_depth,
            entry_file: config.mirror.entry_file.clone(),
            timeout,
        })
    }
}
