//! Crawler module for fetching and processing mirrored resources
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching with retry and redirect handling
//! - Reference extraction from HTML and CSS
//! - Rewriting references to local paths
//! - Overall job coordination

mod coordinator;
mod css;
mod fetcher;
mod job;
mod parser;
mod rewriter;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchedResource, Fetcher, RetryPolicy};
pub use job::MirrorJob;
pub use parser::{extract_references, srcset_candidates, srcset_urls, ParsedDocument};
pub use rewriter::{rewrite, MappedRef, ReferenceMap, RewriteContext};
