/// Resource state definitions for tracking mirror progress
///
/// This module defines every state a resource record can be in during a job,
/// and which transitions between them are legal.
use crate::FetchError;
use std::fmt;

/// Why a resource was recorded but not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Host is outside the mirror scope
    OutOfScope,

    /// Hyperlinked page is too many hops from the root
    DepthLimit,

    /// The job already assigned its maximum number of local paths
    ResourceLimit,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfScope => "out_of_scope",
            Self::DepthLimit => "depth_limit",
            Self::ResourceLimit => "resource_limit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a resource ended up failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Fetching failed after all permitted attempts
    Fetch(FetchError),

    /// The job was cancelled before the resource completed
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<FetchError> for FailureReason {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => Self::Cancelled,
            other => Self::Fetch(other),
        }
    }
}

/// Represents the current state of a resource in the mirror job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    // ===== Active States =====
    /// Registered with a local path and waiting for a worker
    Pending,

    /// A worker is fetching and processing the resource
    Fetching,

    // ===== Terminal States =====
    /// Fetched and written to the mirror tree
    Fetched,

    /// Fetch failed or the job was cancelled first
    Failed(FailureReason),

    /// Recorded but never fetched
    Skipped(SkipReason),
}

impl ResourceState {
    /// Returns true if no further processing will happen
    ///
    /// `Skipped(DepthLimit)` counts as terminal even though a later reference
    /// may still upgrade it back to `Pending`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Fetching)
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Fetching)
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Short machine-readable name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }

    /// Returns true if moving from `self` to `next` is legal
    ///
    /// # Legal transitions
    ///
    /// - `Pending -> Fetching`
    /// - `Fetching -> Fetched | Failed`
    /// - `Pending -> Failed(Cancelled)` when the job is cancelled
    /// - `Skipped(DepthLimit) -> Pending` when a fetchable reference appears
    pub fn can_transition_to(&self, next: &ResourceState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Fetching) => true,
            (Self::Fetching, Self::Fetched) => true,
            (Self::Fetching, Self::Failed(_)) => true,
            (Self::Pending, Self::Failed(FailureReason::Cancelled)) => true,
            (Self::Skipped(SkipReason::DepthLimit), Self::Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({})", reason),
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
