//! The seam to the external directory service.
//!
//! Everything tally reads or mutates lives behind [`Directory`]. The engine
//! treats every call as a potentially slow remote operation and wraps each
//! one in its own timeout; implementations should not add retry logic of
//! their own — the periodic sweep is the retry mechanism.

use async_trait::async_trait;
use thiserror::Error;

use crate::ids::{CounterId, GroupId};
use crate::types::{Child, Counter, Group};

/// Errors surfaced by directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The requested resource does not currently exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind for logging ("group", "counter").
        kind: &'static str,
        /// The ID that failed to resolve.
        id: String,
    },
    /// A read failed for a transient reason (network, rate limit) and may
    /// succeed on the next sweep.
    #[error("transient directory failure: {0}")]
    Transient(String),
    /// A mutation was rejected by the directory.
    #[error("directory rejected mutation: {0}")]
    Rejected(String),
}

impl DirectoryError {
    /// Convenience constructor for [`DirectoryError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Read/write access to the externally owned groups, children, and counters.
///
/// All reads return point-in-time snapshots; callers must not hold them
/// across reconciliation passes.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a group by ID.
    async fn fetch_group(&self, id: &GroupId) -> Result<Group, DirectoryError>;

    /// List all children currently inside a group.
    async fn list_children(&self, group: &GroupId) -> Result<Vec<Child>, DirectoryError>;

    /// Resolve a counter by ID.
    async fn fetch_counter(&self, id: &CounterId) -> Result<Counter, DirectoryError>;

    /// Set a counter's display name.
    async fn set_counter_name(&self, id: &CounterId, name: &str) -> Result<(), DirectoryError>;

    /// Move a counter to `index` within its group. Best-effort; callers
    /// treat failure as non-fatal.
    async fn set_counter_position(&self, id: &CounterId, index: u32)
    -> Result<(), DirectoryError>;
}
