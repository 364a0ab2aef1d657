//! Shared crawl state: the canonical-URL table and the work queue
//!
//! Both live behind one mutex so that registration is atomic with respect to
//! the "is new" check. Workers hold an `Arc<CrawlState>`.

use super::{ContentKind, FailureReason, ResourceKind, ResourceRecord, ResourceState, SkipReason};
use crate::url::{PathRegistry, Resolver};
use crate::{MirrorError, Result};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Limits applied while registering discovered resources
#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    /// Maximum number of records with an assigned local path
    pub max_resources: u32,

    /// Maximum hyperlink hops followed from the root page
    pub max_page_depth: u32,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_resources: 2000,
            max_page_depth: 0,
        }
    }
}

/// A resource waiting for a worker
#[derive(Debug, Clone)]
struct QueuedResource {
    /// Canonical URL string (record key)
    key: String,

    /// Priority value (lower is higher priority)
    priority: u8,

    /// Enqueue order, for FIFO within a priority
    seq: u64,
}

// Lower priority values and earlier sequence numbers are popped first
impl Ord for QueuedResource {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedResource {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedResource {}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ResourceRecord>,
    order: Vec<String>,
    paths: PathRegistry,
    queue: BinaryHeap<QueuedResource>,
    next_seq: u64,
}

impl Inner {
    fn enqueue(&mut self, key: &str, kind: ResourceKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueuedResource {
            key: key.to_string(),
            priority: kind.priority(),
            seq,
        });
    }

    fn transition(&mut self, key: &str, next: ResourceState) -> Result<&mut ResourceRecord> {
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| MirrorError::InvalidInput(format!("Unknown resource: {}", key)))?;

        if !record.state.can_transition_to(&next) {
            return Err(MirrorError::InvalidTransition {
                url: key.to_string(),
                from: record.state.clone(),
                to: next,
            });
        }

        record.state = next;
        Ok(record)
    }
}

/// Owned crawl state for one mirror job
///
/// Holds exactly one [`ResourceRecord`] per canonical URL. A record's local
/// path is assigned when it first becomes fetchable and never changes.
#[derive(Debug)]
pub struct CrawlState {
    resolver: Resolver,
    limits: CrawlLimits,
    inner: Mutex<Inner>,
}

impl CrawlState {
    /// Creates empty crawl state
    pub fn new(resolver: Resolver, limits: CrawlLimits) -> Self {
        Self {
            resolver,
            limits,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The resolver used for scope decisions and path derivation
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the root document and enqueues it
    ///
    /// The root always receives `entry_file` as its local path so repeated
    /// mirrors of the same root produce the same entry file.
    pub fn register_root(&self, entry_file: &str) -> ResourceRecord {
        let url = self.resolver.root().clone();
        let key = url.as_str().to_string();
        let mut inner = self.lock();

        if let Some(existing) = inner.records.get(&key) {
            return existing.clone();
        }

        let path = inner.paths.assign(entry_file, &url);
        let mut record = ResourceRecord::new(url, ResourceKind::Document, 0, None);
        record.local_path = Some(path);

        inner.order.push(key.clone());
        inner.records.insert(key.clone(), record.clone());
        inner.enqueue(&key, ResourceKind::Document);

        record
    }

    /// Registers a canonical URL discovered in a document
    ///
    /// Returns the record for `url` and whether this call scheduled it for
    /// fetching. An existing record is returned unchanged, except that a
    /// depth-skipped page is upgraded to `Pending` when this reference may be
    /// fetched.
    ///
    /// # Arguments
    ///
    /// * `url` - Canonical absolute URL
    /// * `kind` - Kind of the reference
    /// * `depth` - Hyperlink hops from the root for this reference
    /// * `referrer` - Document the reference was found in
    pub fn register(
        &self,
        url: &Url,
        kind: ResourceKind,
        depth: u32,
        referrer: Option<&Url>,
    ) -> (ResourceRecord, bool) {
        let key = url.as_str().to_string();
        let scope = self.resolver.scope(url);
        let too_deep = kind == ResourceKind::Document && depth > self.limits.max_page_depth;

        let mut inner = self.lock();

        if let Some(existing) = inner.records.get(&key) {
            let upgradable =
                existing.state == ResourceState::Skipped(SkipReason::DepthLimit) && !too_deep;
            if !upgradable {
                return (existing.clone(), false);
            }
        }

        let skip = if !scope.is_mirrored() {
            Some(SkipReason::OutOfScope)
        } else if too_deep {
            Some(SkipReason::DepthLimit)
        } else if inner.paths.len() >= self.limits.max_resources as usize {
            Some(SkipReason::ResourceLimit)
        } else {
            None
        };

        if let Some(reason) = skip {
            // Depth-skipped page reached again after the resource limit
            if let Some(existing) = inner.records.get_mut(&key) {
                existing.state = ResourceState::Skipped(reason);
                return (existing.clone(), false);
            }

            let mut record = ResourceRecord::new(url.clone(), kind, depth, referrer.cloned());
            record.state = ResourceState::Skipped(reason);
            inner.order.push(key.clone());
            inner.records.insert(key, record.clone());
            return (record, false);
        }

        let candidate = self.resolver.candidate_path(url, kind, &scope);
        let path = inner.paths.assign(&candidate, url);

        if let Some(existing) = inner.records.get_mut(&key) {
            existing.state = ResourceState::Pending;
            existing.kind = kind;
            existing.local_path = Some(path);
            existing.depth = depth;
            let record = existing.clone();
            inner.enqueue(&key, kind);
            return (record, true);
        }

        let mut record = ResourceRecord::new(url.clone(), kind, depth, referrer.cloned());
        record.local_path = Some(path);
        inner.order.push(key.clone());
        inner.records.insert(key.clone(), record.clone());
        inner.enqueue(&key, kind);

        (record, true)
    }

    /// Pops the highest-priority pending record and marks it `Fetching`
    ///
    /// Returns `None` when the queue is empty.
    pub fn next_pending(&self) -> Option<ResourceRecord> {
        let mut inner = self.lock();

        while let Some(queued) = inner.queue.pop() {
            match inner.transition(&queued.key, ResourceState::Fetching) {
                Ok(record) => return Some(record.clone()),
                // Entry was cancelled or already taken
                Err(_) => continue,
            }
        }

        None
    }

    /// Returns true if records are waiting in the queue
    pub fn has_queued(&self) -> bool {
        !self.lock().queue.is_empty()
    }

    /// Marks a fetching record as fetched
    pub fn mark_fetched(&self, url: &Url, bytes_written: u64) -> Result<()> {
        let mut inner = self.lock();
        let record = inner.transition(url.as_str(), ResourceState::Fetched)?;
        record.bytes_written = Some(bytes_written);
        Ok(())
    }

    /// Marks a fetching record as failed
    pub fn mark_failed(&self, url: &Url, reason: FailureReason) -> Result<()> {
        let mut inner = self.lock();
        inner.transition(url.as_str(), ResourceState::Failed(reason))?;
        Ok(())
    }

    /// Stores what was learned about a fetched payload
    pub fn set_content(
        &self,
        url: &Url,
        content_kind: ContentKind,
        title: Option<String>,
    ) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(url.as_str()) {
            record.content_kind = Some(content_kind);
            if title.is_some() {
                record.title = title;
            }
        }
    }

    /// Marks every pending record as failed with reason `Cancelled`
    ///
    /// Returns the number of records cancelled.
    pub fn cancel_pending(&self) -> usize {
        let mut inner = self.lock();
        inner.queue.clear();

        let mut cancelled = 0;
        for record in inner.records.values_mut() {
            if record.state == ResourceState::Pending {
                record.state = ResourceState::Failed(FailureReason::Cancelled);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Returns a snapshot of the record for `url`
    pub fn record(&self, url: &Url) -> Option<ResourceRecord> {
        self.lock().records.get(url.as_str()).cloned()
    }

    /// Returns snapshots of every record, in discovery order
    pub fn records(&self) -> Vec<ResourceRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key).cloned())
            .collect()
    }

    /// Number of unique canonical URLs recorded
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }
}
