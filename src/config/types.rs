use serde::Deserialize;

/// Main configuration structure for Site-Mirror
///
/// Every section is optional in the TOML file; missing values take the
/// defaults used by [`crate::mirror`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub fetch: FetchConfig,
    pub scope: ScopeConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Maximum number of resources processed concurrently
    pub concurrency: u32,

    /// Maximum number of resources assigned a local path
    #[serde(rename = "max-resources")]
    pub max_resources: u32,

    /// Hyperlink hops followed from the root page (0 = root page only)
    #[serde(rename = "max-page-depth")]
    pub max_page_depth: u32,

    /// Whole-job timeout in seconds (0 = none)
    #[serde(rename = "job-timeout-secs")]
    pub job_timeout_secs: u64,

    /// File name of the saved root document
    #[serde(rename = "entry-file")]
    pub entry_file: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_resources: 2000,
            max_page_depth: 0,
            job_timeout_secs: 0,
            entry_file: "index.html".to_string(),
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Name used in the User-Agent header
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version used in the User-Agent header
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Optional URL with information about the mirror operator
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Per-attempt request timeout in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per resource, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay
    #[serde(rename = "backoff-max-ms")]
    pub backoff_max_ms: u64,

    /// Maximum redirect hops followed per attempt
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            crawler_name: "site-mirror".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn user_agent(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            )
        }
    }
}

/// Mirror scope configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Mirror resources from any host
    #[serde(rename = "cross-origin")]
    pub cross_origin: bool,

    /// Additional host patterns (e.g., "cdn.example.com" or "*.example.com")
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the mirror tree is written under
    #[serde(rename = "save-dir")]
    pub save_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: "mirror".to_string(),
        }
    }
}
