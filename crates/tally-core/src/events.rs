//! Child lifecycle events delivered by the external directory.
//!
//! Events arrive over a `tokio::sync::broadcast` channel and may be dropped
//! (receiver lag) or delivered out of order; the periodic sweep is the
//! correctness backstop, so event handling is purely an optimization for
//! freshness.

use serde::{Deserialize, Serialize};

use crate::types::Child;

/// A child lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryEvent {
    /// A child was created.
    ChildCreated(Child),
    /// A child was deleted. Carries the last observed snapshot.
    ChildDeleted(Child),
    /// A child was renamed and/or moved between parents.
    ChildRenamed {
        /// Snapshot before the update.
        old: Child,
        /// Snapshot after the update.
        new: Child,
    },
}

impl DirectoryEvent {
    /// Short tag for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChildCreated(_) => "child_created",
            Self::ChildDeleted(_) => "child_deleted",
            Self::ChildRenamed { .. } => "child_renamed",
        }
    }
}
