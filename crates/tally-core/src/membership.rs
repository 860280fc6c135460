//! Membership classification and count aggregation.
//!
//! [`MembershipPolicy`] decides whether a child counts as an active member
//! of its group; [`count_active`] applies it to a full children snapshot.
//! Both are pure and deterministic — all case folding happens through
//! `str::to_lowercase`, so comparisons are Unicode-correct.

use crate::ids::{CounterId, GroupId};
use crate::types::{Child, ChildKind};

/// Policy deciding which children are active members.
///
/// A child is active when all of the following hold:
/// - it is not the group's own counter (a counter may sit inside the group
///   it labels, and must never count itself);
/// - its kind matches the configured countable kind;
/// - its name does not start with a terminal-state prefix ("closed",
///   "resolved", …), case-insensitively;
/// - when a tracked-prefix allow-list is configured, its name starts with
///   one of those prefixes.
#[derive(Clone, Debug)]
pub struct MembershipPolicy {
    countable_kind: ChildKind,
    terminal_prefixes: Vec<String>,
    tracked_prefixes: Option<Vec<String>>,
}

impl MembershipPolicy {
    /// Build a policy. Prefix lists are lowercased once here so the per-child
    /// check only folds the child's name.
    #[must_use]
    pub fn new(
        countable_kind: ChildKind,
        terminal_prefixes: &[String],
        tracked_prefixes: Option<&[String]>,
    ) -> Self {
        let lower = |prefixes: &[String]| {
            prefixes
                .iter()
                .map(|p| p.to_lowercase())
                .collect::<Vec<_>>()
        };
        Self {
            countable_kind,
            terminal_prefixes: lower(terminal_prefixes),
            tracked_prefixes: tracked_prefixes.map(lower),
        }
    }

    /// Whether `child` counts as an active member, given the group's counter.
    #[must_use]
    pub fn is_active(&self, child: &Child, counter: &CounterId) -> bool {
        if child.id.as_str() == counter.as_str() {
            return false;
        }
        if child.kind != self.countable_kind {
            return false;
        }
        let name = child.name.to_lowercase();
        if self.terminal_prefixes.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        match &self.tracked_prefixes {
            Some(allowed) => allowed.iter().any(|p| name.starts_with(p)),
            None => true,
        }
    }
}

/// Count the active members of `group` in a children snapshot.
///
/// Filters to children whose parent is `group`, then applies `policy`.
/// Order-independent, O(children).
#[must_use]
pub fn count_active(
    children: &[Child],
    group: &GroupId,
    counter: &CounterId,
    policy: &MembershipPolicy,
) -> usize {
    children
        .iter()
        .filter(|c| c.parent_id.as_ref() == Some(group))
        .filter(|c| policy.is_active(c, counter))
        .count()
}
