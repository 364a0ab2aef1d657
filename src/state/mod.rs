//! State module for tracking mirror progress
//!
//! # Components
//!
//! - `ResourceState`: lifecycle of a single resource (pending, fetching, fetched, failed, skipped)
//! - `ResourceRecord` / `ResourceRef`: per-URL bookkeeping and discovered references
//! - `CrawlState`: the shared canonical-URL table and work queue

mod crawl_state;
mod resource;
mod resource_state;

// Re-export main types
pub use crawl_state::{CrawlLimits, CrawlState};
pub use resource::{ContentKind, ResourceKind, ResourceRecord, ResourceRef};
pub use resource_state::{FailureReason, ResourceState, SkipReason};
