//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building HTTP clients with proper user agent strings
//! - Manual redirect handling with loop detection
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::FetchConfig;
use crate::state::ContentKind;
use crate::FetchError;
use reqwest::{header, redirect::Policy, Client};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// URL that was requested
    pub requested_url: Url,

    /// URL after following redirects
    pub final_url: Url,

    /// HTTP status code of the final response
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Response body
    pub body: Vec<u8>,

    /// How the body will be processed
    pub content_kind: ContentKind,

    /// Number of attempts used, including the successful one
    pub attempts: u32,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`Fetcher`] follows them itself so
/// it can bound the hop count and detect loops.
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_mirror::config::FetchConfig;
/// use site_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    ///
    /// Doubles with every attempt starting at `base_delay`, capped at
    /// `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Per-fetch attempt state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptState {
    /// Sending attempt number `attempt` (1-based)
    Fetching { attempt: u32 },

    /// Waiting out the backoff before attempt number `next`
    Retrying { next: u32, delay: Duration },
}

/// Fetches resources with retry, backoff and manual redirects
///
/// The fetcher touches no shared crawl state; callers update records from
/// its result.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy, max_redirects: usize) -> Self {
        Self {
            client,
            policy,
            max_redirects,
        }
    }

    /// Builds a fetcher and its HTTP client from configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(config)?,
            RetryPolicy::from_config(config),
            config.max_redirects as usize,
        ))
    }

    /// Fetches a URL with full error handling and retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 4xx | Immediate failure |
    /// | HTTP 5xx | Retry with backoff |
    /// | Timeout, connection failure, interrupted body | Retry with backoff |
    /// | Redirect loop, too many redirects | Immediate failure |
    /// | Unsupported scheme, malformed URL | Immediate failure |
    ///
    /// An attempt already in flight is never interrupted. Cancellation is
    /// observed before each attempt and during backoff, and yields
    /// `FetchError::Cancelled`.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `cancel` - Job cancellation signal
    pub async fn fetch(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchedResource, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut state = AttemptState::Fetching { attempt: 1 };

        loop {
            state = match state {
                AttemptState::Fetching { attempt } => {
                    if cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }

                    match self.attempt(url).await {
                        Ok(mut fetched) => {
                            fetched.attempts = attempt;
                            return Ok(fetched);
                        }
                        Err(e) if e.is_retriable() && attempt < self.policy.max_attempts => {
                            let delay = self.policy.delay_for(attempt);
                            tracing::debug!(
                                "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                                attempt,
                                self.policy.max_attempts,
                                url,
                                e,
                                delay
                            );
                            AttemptState::Retrying {
                                next: attempt + 1,
                                delay,
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
                AttemptState::Retrying { next, delay } => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => AttemptState::Fetching { attempt: next },
                    }
                }
            };
        }
    }

    /// Performs one attempt, following redirects manually
    async fn attempt(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let mut current = url.clone();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current.as_str().to_string());
        let mut hops = 0usize;

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(classify_error)?;

            let status = response.status();

            if status.is_redirection() {
                let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return Err(FetchError::Status(status.as_u16()));
                };

                let mut next = current
                    .join(location)
                    .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", location, e)))?;
                next.set_fragment(None);

                if next.scheme() != "http" && next.scheme() != "https" {
                    return Err(FetchError::UnsupportedScheme(next.scheme().to_string()));
                }

                hops += 1;
                if hops > self.max_redirects {
                    return Err(FetchError::TooManyRedirects { hops });
                }

                if !visited.insert(next.as_str().to_string()) {
                    return Err(FetchError::RedirectLoop {
                        url: next.to_string(),
                    });
                }

                tracing::trace!("Redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response.bytes().await.map_err(classify_error)?.to_vec();
            let content_kind = ContentKind::detect(content_type.as_deref(), &current, &body);

            return Ok(FetchedResource {
                requested_url: url.clone(),
                final_url: current,
                status: status.as_u16(),
                content_type,
                body,
                content_kind,
                attempts: 1,
            });
        }
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        FetchError::Body(e.to_string())
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(max_attempts: u32) -> Fetcher {
        let config = FetchConfig {
            max_attempts,
            backoff_base_ms: 10,
            backoff_max_ms: 20,
            request_timeout_secs: 5,
            ..FetchConfig::default()
        };
        Fetcher::from_config(&config).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&FetchConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(30), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_fetch_success_detects_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
            .mount(&server)
            .await;

        let fetched = test_fetcher(3)
            .fetch(&url(&server, "/style.css"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.body, b"body{}");
        assert_eq!(fetched.content_kind, ContentKind::Css);
        assert_eq!(fetched.attempts, 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_fetcher(3)
            .fetch(&url(&server, "/missing.png"), &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_server_error_is_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = test_fetcher(3)
            .fetch(&url(&server, "/flaky"), &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), FetchError::Status(503));
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
            .mount(&server)
            .await;

        let fetched = test_fetcher(3)
            .fetch(&url(&server, "/flaky"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetched.body, b"ok");
        assert_eq!(fetched.attempts, 2);
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let fetched = test_fetcher(1)
            .fetch(&url(&server, "/old"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetched.final_url.path(), "/new");
        assert_eq!(fetched.requested_url.path(), "/old");
        assert_eq!(fetched.content_kind, ContentKind::Html);
    }

    #[tokio::test]
    async fn test_redirect_loop_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/a"))
            .mount(&server)
            .await;

        let result = test_fetcher(1)
            .fetch(&url(&server, "/a"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(FetchError::RedirectLoop { .. })));
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let server = MockServer::start().await;
        for i in 0..5 {
            Mock::given(method("GET"))
                .and(path(format!("/r{}", i)))
                .respond_with(
                    ResponseTemplate::new(302).insert_header("Location", format!("/r{}", i + 1).as_str()),
                )
                .mount(&server)
                .await;
        }

        let fetcher = Fetcher::new(
            build_http_client(&FetchConfig::default()).unwrap(),
            RetryPolicy::default(),
            2,
        );
        let result = fetcher
            .fetch(&url(&server, "/r0"), &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err(), FetchError::TooManyRedirects { hops: 3 });
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = test_fetcher(3).fetch(&url(&server, "/"), &cancel).await;
        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let result = test_fetcher(1)
            .fetch(
                &Url::parse("ftp://example.com/file").unwrap(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(FetchError::UnsupportedScheme(_))));
    }
}
