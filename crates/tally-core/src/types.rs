//! Snapshot types for externally owned resources.
//!
//! The directory service owns and mutates all of these; tally only ever
//! reads point-in-time snapshots during a reconciliation pass and must never
//! cache one across passes.

use serde::{Deserialize, Serialize};

use crate::ids::{ChildId, CounterId, GroupId};

/// The kind of a child resource. Only one kind is countable (configurable,
/// text by default); the rest never count even when nested in a tracked
/// group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    /// Text-channel-like resource.
    #[default]
    Text,
    /// Voice-channel-like resource.
    Voice,
    /// A nested container.
    Category,
    /// Anything else the directory may grow.
    Other,
}

/// A group — the logical container whose active children are counted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Directory-assigned identifier.
    pub id: GroupId,
    /// Display name of the group.
    pub name: String,
}

/// One member of a group, as observed in the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    /// Directory-assigned identifier.
    pub id: ChildId,
    /// Parent group, if any. Top-level children have none and never count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<GroupId>,
    /// Resource kind.
    pub kind: ChildKind,
    /// Display name.
    pub name: String,
}

/// The display resource whose name encodes a derived count.
///
/// `name` is the only field tally is responsible for, and it must be re-read
/// immediately before every write decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    /// Directory-assigned identifier.
    pub id: CounterId,
    /// Current display name, e.g. `"tickets: 4"`.
    pub name: String,
}
