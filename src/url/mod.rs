//! URL handling module for Site-Mirror
//!
//! This module provides URL canonicalization, reference resolution, scope
//! decisions and local path assignment.

mod domain;
mod local_path;
mod matcher;
mod normalize;

use crate::config::ScopeConfig;
use crate::state::{ResourceKind, ResourceRef};
use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, host_dir_name, origin_key};
pub use local_path::{derive_local_path, insert_suffix, relative_href, short_hash, PathRegistry};
pub use matcher::matches_host_pattern;
pub use normalize::{canonicalize, normalize_url};

/// Schemes and prefixes that never name a fetchable resource
const SKIPPED_PREFIXES: &[&str] = &[
    "javascript:",
    "mailto:",
    "tel:",
    "sms:",
    "data:",
    "about:",
    "blob:",
];

/// Returns true if a raw reference should never be resolved
///
/// Empty values, fragment-only anchors and non-fetchable schemes
/// (`javascript:`, `mailto:`, `tel:`, `data:` and similar) are skipped.
pub fn is_skippable_reference(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return true;
    }

    let lower = raw.to_ascii_lowercase();
    SKIPPED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Scope decision for a canonical URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Same origin as the root; stored at the top of the mirror tree
    Root,
    /// Another origin that is mirrored under a host-qualified directory
    Foreign { host_dir: String },
    /// Not mirrored; references stay absolute
    OutOfScope,
}

impl Scope {
    /// Returns true if resources in this scope are fetched
    pub fn is_mirrored(&self) -> bool {
        !matches!(self, Self::OutOfScope)
    }
}

/// Policy deciding which origins are mirrored
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    /// Mirror every origin
    pub cross_origin: bool,
    /// Host patterns mirrored in addition to the root origin
    pub allowed_hosts: Vec<String>,
}

impl ScopePolicy {
    /// Same-origin-only policy
    pub fn same_origin() -> Self {
        Self::default()
    }

    /// Returns true if a foreign host may be mirrored
    pub fn allows_foreign(&self, host: &str) -> bool {
        self.cross_origin
            || self
                .allowed_hosts
                .iter()
                .any(|pattern| matches_host_pattern(pattern, host))
    }
}

impl From<&ScopeConfig> for ScopePolicy {
    fn from(config: &ScopeConfig) -> Self {
        Self {
            cross_origin: config.cross_origin,
            allowed_hosts: config.allowed_hosts.clone(),
        }
    }
}

/// Resolves references and decides scope relative to a mirror root
///
/// A resolver is immutable for the lifetime of a job.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: Url,
    root_origin: String,
    policy: ScopePolicy,
}

impl Resolver {
    /// Creates a resolver for the canonical `root`
    pub fn new(root: Url, policy: ScopePolicy) -> UrlResult<Self> {
        let root = canonicalize(&root)?;
        let root_origin = origin_key(&root).ok_or(UrlError::MissingDomain)?;
        Ok(Self {
            root,
            root_origin,
            policy,
        })
    }

    /// The canonical root URL
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Resolves a discovered reference into its canonical absolute URL
    ///
    /// Relative references are resolved against the reference's base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use site_mirror::state::{ResourceKind, ResourceRef};
    /// use site_mirror::url::{Resolver, ScopePolicy};
    /// use url::Url;
    ///
    /// let root = Url::parse("https://example.com/").unwrap();
    /// let resolver = Resolver::new(root.clone(), ScopePolicy::same_origin()).unwrap();
    ///
    /// let base = Url::parse("https://example.com/blog/post.html").unwrap();
    /// let reference = ResourceRef::new("../img/a.png#x", base, ResourceKind::Image);
    /// let canonical = resolver.resolve(&reference).unwrap();
    /// assert_eq!(canonical.as_str(), "https://example.com/img/a.png");
    /// ```
    pub fn resolve(&self, reference: &ResourceRef) -> UrlResult<Url> {
        let raw = reference.raw.trim();
        if is_skippable_reference(raw) {
            return Err(UrlError::InvalidScheme(format!(
                "Reference is not fetchable: {}",
                raw
            )));
        }

        let joined = reference
            .base
            .join(raw)
            .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

        canonicalize(&joined)
    }

    /// Decides whether a canonical URL is mirrored, and where
    pub fn scope(&self, url: &Url) -> Scope {
        let Some(origin) = origin_key(url) else {
            return Scope::OutOfScope;
        };

        if origin == self.root_origin {
            return Scope::Root;
        }

        let host = extract_domain(url).unwrap_or_default();
        if self.policy.allows_foreign(&host) {
            if let Some(host_dir) = host_dir_name(url) {
                return Scope::Foreign { host_dir };
            }
        }

        Scope::OutOfScope
    }

    /// Derives the candidate local path for a mirrored URL
    pub fn candidate_path(&self, url: &Url, kind: ResourceKind, scope: &Scope) -> String {
        match scope {
            Scope::Foreign { host_dir } => derive_local_path(url, kind, Some(host_dir)),
            _ => derive_local_path(url, kind, None),
        }
    }
}
