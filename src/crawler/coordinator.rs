//! Mirror coordinator - main crawl orchestration logic
//!
//! This module drives a mirror job to completion:
//! - Seeding the crawl state with the root document
//! - Dispatching fetch-and-process workers from the shared queue
//! - Registering discovered references and rewriting documents
//! - Handling cancellation and the job timeout
//! - Building the final `MirrorResult`

use crate::config::Config;
use crate::crawler::{extract_references, rewrite, Fetcher, MirrorJob, ReferenceMap, RewriteContext};
use crate::output::MirrorResult;
use crate::state::{
    CrawlLimits, CrawlState, FailureReason, ResourceKind, ResourceRecord, ResourceRef,
    ResourceState,
};
use crate::storage::{FsStore, ResourceStore, StorageError};
use crate::url::Resolver;
use crate::{MirrorError, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Main mirror coordinator structure
pub struct Coordinator {
    job: MirrorJob,
    state: Arc<CrawlState>,
    fetcher: Arc<Fetcher>,
    store: Arc<dyn ResourceStore>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens (creating if needed) the save directory. No network activity
    /// happens until [`Coordinator::run`].
    ///
    /// # Arguments
    ///
    /// * `job` - The validated mirror job
    /// * `config` - Configuration the HTTP client is built from
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(MirrorError)` - The save directory or HTTP client could not be set up
    pub fn new(job: MirrorJob, config: &Config) -> Result<Self> {
        let resolver = Resolver::new(job.root_url.clone(), job.scope.clone())?;
        let limits = CrawlLimits {
            max_resources: job.max_resources,
            max_page_depth: job.max_page_depth,
        };

        let fetcher = Fetcher::from_config(&config.fetch)?;
        let store = FsStore::new(&job.save_dir)?;

        Ok(Self {
            job,
            state: Arc::new(CrawlState::new(resolver, limits)),
            fetcher: Arc::new(fetcher),
            store: Arc::new(store),
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `cancel` as the job's cancellation signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the fetcher
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Replaces the storage backend
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = store;
        self
    }

    /// Token that cancels this job when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The shared crawl state
    pub fn state(&self) -> Arc<CrawlState> {
        Arc::clone(&self.state)
    }

    /// Runs the mirror to completion
    ///
    /// Workers are dispatched while the queue has records and fewer than
    /// `concurrency` are in flight. The loop ends when the queue is empty and
    /// no worker is running, or when the job is cancelled and every in-flight
    /// worker has finished.
    ///
    /// # Errors
    ///
    /// * `MirrorError::RootFetchFailed` - the root document could not be fetched
    /// * `MirrorError::Cancelled` - the job was cancelled before the root completed
    /// * `MirrorError::Storage` - a file could not be written
    pub async fn run(self) -> Result<MirrorResult> {
        let started_at = Utc::now();
        // Fatal errors and the timer cancel this job only, not the caller's token
        let cancel = self.cancel.child_token();
        let root = self.state.register_root(&self.job.entry_file);

        tracing::info!(
            "Mirroring {} into {}",
            root.url,
            self.job.save_dir.display()
        );

        let timer = self.job.timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!("Job timeout of {:?} reached, cancelling", timeout);
                cancel.cancel();
            })
        });

        let worker = Worker {
            state: Arc::clone(&self.state),
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            cancel: cancel.clone(),
        };

        let mut workers: JoinSet<Result<()>> = JoinSet::new();
        let mut fatal: Option<MirrorError> = None;
        let mut completed = 0usize;

        loop {
            if !cancel.is_cancelled() {
                while workers.len() < self.job.concurrency {
                    let Some(record) = self.state.next_pending() else {
                        break;
                    };
                    let worker = worker.clone();
                    workers.spawn(async move { worker.process(record).await });
                }
            }

            match workers.join_next().await {
                Some(joined) => {
                    completed += 1;
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => Err(MirrorError::Worker(e)),
                    };
                    if let Err(e) = outcome {
                        tracing::error!("Aborting mirror: {}", e);
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                        cancel.cancel();
                    }

                    if completed % 25 == 0 {
                        tracing::info!(
                            "Progress: {} resources processed, {} recorded, {} in flight",
                            completed,
                            self.state.len(),
                            workers.len()
                        );
                    }
                }
                None => {
                    if cancel.is_cancelled() || !self.state.has_queued() {
                        break;
                    }
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            let count = self.state.cancel_pending();
            tracing::warn!("Mirror cancelled, {} pending resources not fetched", count);
        }

        let root = self.state.record(&root.url).unwrap_or(root);
        match &root.state {
            ResourceState::Fetched => {}
            ResourceState::Failed(FailureReason::Fetch(e)) => {
                return Err(MirrorError::RootFetchFailed {
                    url: root.url.to_string(),
                    source: e.clone(),
                });
            }
            _ => {
                return Err(MirrorError::Cancelled {
                    url: root.url.to_string(),
                });
            }
        }

        let entry = root.local_path.as_deref().unwrap_or(&self.job.entry_file);
        let index_file = self.store.resolve(entry);
        let records = self.state.records();

        let result = MirrorResult::from_records(
            &root,
            self.store.root().to_path_buf(),
            index_file,
            &records,
            started_at,
            cancelled,
        );

        tracing::info!(
            "Mirror completed: {} fetched, {} failed, {} skipped in {:.2}s",
            result.fetched_count(),
            result.failed_count(),
            result.skipped_count(),
            result.duration().num_milliseconds() as f64 / 1000.0
        );

        Ok(result)
    }
}

/// Fetch-and-process task for one record
#[derive(Clone)]
struct Worker {
    state: Arc<CrawlState>,
    fetcher: Arc<Fetcher>,
    store: Arc<dyn ResourceStore>,
    cancel: CancellationToken,
}

impl Worker {
    /// Fetches, parses, rewrites and stores one record
    ///
    /// Fetch failures are recorded against the record and are not errors.
    /// Storage failures and state inconsistencies are returned and abort the
    /// job.
    async fn process(&self, record: ResourceRecord) -> Result<()> {
        let url = record.url.clone();
        let local_path = record
            .local_path
            .clone()
            .ok_or_else(|| StorageError::InvalidPath(format!("no local path for {}", url)))?;

        tracing::debug!("Fetching {} ({})", url, record.kind);

        let fetched = match self.fetcher.fetch(&url, &self.cancel).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let reason = FailureReason::from(e);
                match &reason {
                    FailureReason::Cancelled => tracing::debug!("Cancelled {}", url),
                    FailureReason::Fetch(e) => tracing::warn!("Failed to fetch {}: {}", url, e),
                }
                self.state.mark_failed(&url, reason)?;
                return Ok(());
            }
        };

        let content_kind = fetched.content_kind;
        let (body, title) = if content_kind.is_parseable() {
            let parsed = extract_references(&fetched.body, content_kind, &fetched.final_url);
            let references = self.register_references(&record, &parsed.references);

            tracing::debug!(
                "{}: {} references, {} mapped",
                url,
                parsed.references.len(),
                references.len()
            );

            let ctx = RewriteContext {
                document_path: &local_path,
                references: &references,
            };
            (rewrite(&fetched.body, content_kind, &ctx), parsed.title)
        } else {
            (fetched.body, None)
        };

        let bytes_written = body.len() as u64;
        let store = Arc::clone(&self.store);
        let path = local_path.clone();
        tokio::task::spawn_blocking(move || store.write(&path, &body)).await??;

        self.state.set_content(&url, content_kind, title);
        self.state.mark_fetched(&url, bytes_written)?;

        tracing::debug!("Saved {} as {} ({} bytes)", url, local_path, bytes_written);
        Ok(())
    }

    /// Registers every reference of a document and maps it for rewriting
    ///
    /// Hyperlinked documents are one hop deeper than the referring record;
    /// everything else inherits its depth. Every occurrence is registered,
    /// so an asset that is also hyperlinked is upgraded from a depth skip by
    /// its embedding reference. The map is built afterwards from the final
    /// record states. References that cannot be resolved are left unmapped
    /// and therefore untouched by the rewriter.
    fn register_references(
        &self,
        referrer: &ResourceRecord,
        references: &[ResourceRef],
    ) -> ReferenceMap {
        let mut resolved: Vec<(&ResourceRef, Url)> = Vec::with_capacity(references.len());

        for reference in references {
            let target = match self.state.resolver().resolve(reference) {
                Ok(target) => target,
                Err(e) => {
                    tracing::trace!("Ignoring reference {:?}: {}", reference.raw, e);
                    continue;
                }
            };

            let depth = if reference.kind == ResourceKind::Document {
                referrer.depth + 1
            } else {
                referrer.depth
            };

            let (_, is_new) =
                self.state
                    .register(&target, reference.kind, depth, Some(&referrer.url));

            if is_new {
                tracing::debug!("Queued {} ({})", target, reference.kind);
            }

            resolved.push((reference, target));
        }

        let mut map = ReferenceMap::new();

        for (reference, target) in resolved {
            if map.get(&reference.raw).is_some() {
                continue;
            }

            let Some(record) = self.state.record(&target) else {
                continue;
            };

            match (&record.state, &record.local_path) {
                (ResourceState::Skipped(reason), _) => {
                    tracing::debug!("Skipped {} ({})", target, reason);
                    map.insert_remote(&reference.raw, absolute_reference(reference, &target));
                }
                (_, Some(path)) => map.insert_local(&reference.raw, path.clone()),
                (_, None) => {
                    map.insert_remote(&reference.raw, absolute_reference(reference, &target))
                }
            }
        }

        map
    }
}

/// Absolute form of a reference, keeping its fragment
fn absolute_reference(reference: &ResourceRef, canonical: &Url) -> String {
    reference
        .base
        .join(reference.raw.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| canonical.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.output.save_dir = dir.path().to_string_lossy().into_owned();
        config.fetch.max_attempts = 1;
        config.fetch.backoff_base_ms = 1;
        config
    }

    async fn run(url: &str, config: &Config) -> Result<MirrorResult> {
        let job = MirrorJob::new(url, config)?;
        Coordinator::new(job, config)?.run().await
    }

    #[tokio::test]
    async fn test_run_rewrites_and_writes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><head><title>Home</title><link rel="stylesheet" href="/css/site.css"></head><body><img src="img/a.png"></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/css/site.css"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("body{background:url(../img/a.png)}", "text/css"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8, b'P', b'N', b'G'], "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = run(&format!("{}/", server.uri()), &config_for(&dir))
            .await
            .unwrap();

        assert_eq!(result.fetched_count(), 3);
        assert_eq!(result.failed_count(), 0);
        assert_eq!(result.title.as_deref(), Some("Home"));
        assert_eq!(result.index_file, dir.path().join("index.html"));

        let index = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(index.contains(r#"href="css/site.css""#));
        assert!(index.contains(r#"src="img/a.png""#));

        let css = std::fs::read_to_string(dir.path().join("css/site.css")).unwrap();
        assert_eq!(css, "body{background:url(../img/a.png)}");
        assert!(dir.path().join("img/a.png").is_file());
    }

    #[tokio::test]
    async fn test_run_root_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = run(&format!("{}/", server.uri()), &config_for(&dir))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MirrorError::RootFetchFailed {
                source: crate::FetchError::Status(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let job = MirrorJob::new(&format!("{}/", server.uri()), &config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Coordinator::new(job, &config)
            .unwrap()
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Cancelled { .. }));
    }
}
