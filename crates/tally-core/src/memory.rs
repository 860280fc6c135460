//! In-memory [`Directory`] implementation.
//!
//! Backs the engine's test suite and the scenario replay harness. Mutation
//! helpers emit [`DirectoryEvent`]s on a broadcast channel exactly as a live
//! backend would, so the full event → dispatcher → reconciler path can be
//! exercised in-process.
//!
//! Test instrumentation (all inert by default):
//! - per-call latency injection, for overlap/serialization tests
//! - an offline switch that fails every read with a transient error
//! - per-counter rename poisoning, for write-failure paths
//! - rename/position logs, for no-op write suppression assertions
//! - a high-water mark of concurrent `list_children` calls

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::directory::{Directory, DirectoryError};
use crate::events::DirectoryEvent;
use crate::ids::{ChildId, CounterId, GroupId};
use crate::types::{Child, Counter, Group};

/// Broadcast capacity for emitted events. Slow receivers observe `Lagged`
/// past this, which the engine tolerates (the sweep heals gaps).
const EVENT_CAPACITY: usize = 256;

/// In-memory directory backend.
pub struct MemoryDirectory {
    groups: RwLock<HashMap<GroupId, Group>>,
    children: RwLock<HashMap<ChildId, Child>>,
    counters: RwLock<HashMap<CounterId, Counter>>,
    events: broadcast::Sender<DirectoryEvent>,

    latency: Mutex<Duration>,
    offline: AtomicBool,
    poisoned_renames: Mutex<HashSet<CounterId>>,
    rename_log: Mutex<Vec<(CounterId, String)>>,
    position_log: Mutex<Vec<(CounterId, u32)>>,
    listing_now: AtomicUsize,
    listing_peak: AtomicUsize,
    listing_calls: AtomicUsize,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            groups: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            events,
            latency: Mutex::new(Duration::ZERO),
            offline: AtomicBool::new(false),
            poisoned_renames: Mutex::new(HashSet::new()),
            rename_log: Mutex::new(Vec::new()),
            position_log: Mutex::new(Vec::new()),
            listing_now: AtomicUsize::new(0),
            listing_peak: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
        }
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    // ── Seeding ────────────────────────────────────────────────────────

    /// Insert or replace a group.
    pub fn insert_group(&self, group: Group) {
        let _ = self.groups.write().insert(group.id.clone(), group);
    }

    /// Insert or replace a counter.
    pub fn insert_counter(&self, counter: Counter) {
        let _ = self.counters.write().insert(counter.id.clone(), counter);
    }

    /// Insert or replace a child without emitting an event (initial seeding).
    pub fn seed_child(&self, child: Child) {
        let _ = self.children.write().insert(child.id.clone(), child);
    }

    // ── Live mutations (emit events) ───────────────────────────────────

    /// Create a child and emit [`DirectoryEvent::ChildCreated`].
    pub fn create_child(&self, child: Child) {
        let _ = self.children.write().insert(child.id.clone(), child.clone());
        let _ = self.events.send(DirectoryEvent::ChildCreated(child));
    }

    /// Delete a child and emit [`DirectoryEvent::ChildDeleted`].
    ///
    /// Returns the removed snapshot, if the child existed.
    pub fn delete_child(&self, id: &ChildId) -> Option<Child> {
        let removed = self.children.write().remove(id);
        if let Some(child) = &removed {
            let _ = self.events.send(DirectoryEvent::ChildDeleted(child.clone()));
        }
        removed
    }

    /// Rename a child and emit [`DirectoryEvent::ChildRenamed`].
    pub fn rename_child(&self, id: &ChildId, new_name: &str) -> Option<Child> {
        let (old, new) = {
            let mut children = self.children.write();
            let entry = children.get_mut(id)?;
            let old = entry.clone();
            entry.name = new_name.to_owned();
            (old, entry.clone())
        };
        let _ = self.events.send(DirectoryEvent::ChildRenamed { old, new: new.clone() });
        Some(new)
    }

    /// Move a child to another parent and emit [`DirectoryEvent::ChildRenamed`].
    pub fn move_child(&self, id: &ChildId, parent: Option<GroupId>) -> Option<Child> {
        let (old, new) = {
            let mut children = self.children.write();
            let entry = children.get_mut(id)?;
            let old = entry.clone();
            entry.parent_id = parent;
            (old, entry.clone())
        };
        let _ = self.events.send(DirectoryEvent::ChildRenamed { old, new: new.clone() });
        Some(new)
    }

    // ── Test instrumentation ───────────────────────────────────────────

    /// Delay every directory call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fail all reads with [`DirectoryError::Transient`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `set_counter_name` fail for `counter` until cleared.
    pub fn poison_rename(&self, counter: &CounterId) {
        let _ = self.poisoned_renames.lock().insert(counter.clone());
    }

    /// Clear rename poisoning for `counter`.
    pub fn heal_rename(&self, counter: &CounterId) {
        let _ = self.poisoned_renames.lock().remove(counter);
    }

    /// Every `set_counter_name` call observed, in order.
    #[must_use]
    pub fn rename_log(&self) -> Vec<(CounterId, String)> {
        self.rename_log.lock().clone()
    }

    /// Every `set_counter_position` call observed, in order.
    #[must_use]
    pub fn position_log(&self) -> Vec<(CounterId, u32)> {
        self.position_log.lock().clone()
    }

    /// Highest number of `list_children` calls ever in flight at once.
    #[must_use]
    pub fn listing_peak(&self) -> usize {
        self.listing_peak.load(Ordering::SeqCst)
    }

    /// Total `list_children` calls observed. Each reconciliation pass lists
    /// exactly once, so this counts passes that reached the fetch phase.
    #[must_use]
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Current name of a counter, for assertions.
    #[must_use]
    pub fn counter_name(&self, id: &CounterId) -> Option<String> {
        self.counters.read().get(id).map(|c| c.name.clone())
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_online(&self) -> Result<(), DirectoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Transient("directory offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn fetch_group(&self, id: &GroupId) -> Result<Group, DirectoryError> {
        self.simulate_latency().await;
        self.check_online()?;
        self.groups
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("group", id.as_str()))
    }

    async fn list_children(&self, group: &GroupId) -> Result<Vec<Child>, DirectoryError> {
        let now = self.listing_now.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.listing_peak.fetch_max(now, Ordering::SeqCst);
        let _ = self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let _ = self.listing_now.fetch_sub(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self
            .children
            .read()
            .values()
            .filter(|c| c.parent_id.as_ref() == Some(group))
            .cloned()
            .collect())
    }

    async fn fetch_counter(&self, id: &CounterId) -> Result<Counter, DirectoryError> {
        self.simulate_latency().await;
        self.check_online()?;
        self.counters
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found("counter", id.as_str()))
    }

    async fn set_counter_name(&self, id: &CounterId, name: &str) -> Result<(), DirectoryError> {
        self.simulate_latency().await;
        self.rename_log.lock().push((id.clone(), name.to_owned()));
        if self.poisoned_renames.lock().contains(id) {
            return Err(DirectoryError::Rejected("rename poisoned".to_owned()));
        }
        {
            let mut counters = self.counters.write();
            let counter = counters
                .get_mut(id)
                .ok_or_else(|| DirectoryError::not_found("counter", id.as_str()))?;
            counter.name = name.to_owned();
        }
        // A counter is itself a child in the directory; keep the sibling
        // snapshot coherent when one exists under the same id.
        let child_id = ChildId::from(id.as_str());
        if let Some(child) = self.children.write().get_mut(&child_id) {
            child.name = name.to_owned();
        }
        Ok(())
    }

    async fn set_counter_position(
        &self,
        id: &CounterId,
        index: u32,
    ) -> Result<(), DirectoryError> {
        self.simulate_latency().await;
        if !self.counters.read().contains_key(id) {
            return Err(DirectoryError::not_found("counter", id.as_str()));
        }
        self.position_log.lock().push((id.clone(), index));
        Ok(())
    }
}
