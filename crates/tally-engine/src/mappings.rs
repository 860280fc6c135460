//! Immutable group-to-counter bindings.
//!
//! Built once from validated settings and shared by reference everywhere —
//! there is no mutable configuration state anywhere in the engine.

use std::collections::HashMap;

use tally_core::ids::{CounterId, GroupId};
use tally_settings::CounterMapping;

/// The configured group-to-counter bindings, with stable sweep order.
#[derive(Debug, Default)]
pub struct MappingTable {
    by_group: HashMap<GroupId, CounterId>,
    order: Vec<GroupId>,
}

impl MappingTable {
    /// Build from validated settings entries.
    ///
    /// Duplicate groups were already rejected by settings validation; if one
    /// slips through, the first entry wins.
    #[must_use]
    pub fn from_settings(mappings: &[CounterMapping]) -> Self {
        let mut table = Self::default();
        for entry in mappings {
            let group = GroupId::from(entry.group_id.as_str());
            if table.by_group.contains_key(&group) {
                continue;
            }
            let _ = table
                .by_group
                .insert(group.clone(), CounterId::from(entry.counter_id.as_str()));
            table.order.push(group);
        }
        table
    }

    /// The counter bound to `group`, if configured.
    #[must_use]
    pub fn counter_for(&self, group: &GroupId) -> Option<&CounterId> {
        self.by_group.get(group)
    }

    /// Whether `group` has a configured counter.
    #[must_use]
    pub fn contains(&self, group: &GroupId) -> bool {
        self.by_group.contains_key(group)
    }

    /// All configured groups, in settings order (the sweep order).
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.order.iter()
    }

    /// Number of configured bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no bindings are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
