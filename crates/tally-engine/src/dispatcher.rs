//! Maps directory events onto reconciliation requests.
//!
//! Events are a freshness optimization, not a correctness mechanism: the
//! receive loop tolerates lag (dropped events) because the periodic sweep
//! re-derives every counter from scratch anyway.

use tally_core::events::DirectoryEvent;
use tally_core::ids::GroupId;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::scheduler::{Reason, ReconcileRequest, ReconcileScheduler};

/// Turns child lifecycle events into scheduler requests.
pub struct EventDispatcher {
    scheduler: ReconcileScheduler,
}

impl EventDispatcher {
    /// Create a dispatcher feeding `scheduler`. Group filtering uses the
    /// scheduler's own mapping table.
    #[must_use]
    pub fn new(scheduler: ReconcileScheduler) -> Self {
        Self { scheduler }
    }

    /// Classify one event and enqueue requests for the affected configured
    /// groups. Synchronous and non-blocking.
    pub fn dispatch(&self, event: &DirectoryEvent) {
        match event {
            DirectoryEvent::ChildCreated(child) | DirectoryEvent::ChildDeleted(child) => {
                self.touch(child.parent_id.as_ref());
            }
            DirectoryEvent::ChildRenamed { old, new } => {
                if old.name == new.name && old.parent_id == new.parent_id {
                    trace!(child = %new.id, "update changed neither name nor parent");
                    return;
                }
                // A move affects the counts on both sides; reconcile every
                // configured parent among old and new.
                self.touch(old.parent_id.as_ref());
                if new.parent_id != old.parent_id {
                    self.touch(new.parent_id.as_ref());
                }
            }
        }
    }

    fn touch(&self, parent: Option<&GroupId>) {
        let Some(group) = parent else {
            return;
        };
        if !self.scheduler.tracks(group) {
            trace!(%group, "event outside configured groups");
            return;
        }
        self.scheduler.enqueue(ReconcileRequest {
            group: group.clone(),
            reason: Reason::Event,
        });
    }

    /// Consume events until the channel closes or `cancel` fires.
    pub async fn run(self, mut rx: broadcast::Receiver<DirectoryEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                result = rx.recv() => match result {
                    Ok(event) => {
                        trace!(kind = event.kind(), "directory event");
                        self.dispatch(&event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "event stream lagged; periodic sweep will heal");
                    }
                    Err(RecvError::Closed) => {
                        debug!("event stream closed");
                        break;
                    }
                },
                () = cancel.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tally_core::ids::{ChildId, CounterId};
    use tally_core::membership::MembershipPolicy;
    use tally_core::memory::MemoryDirectory;
    use tally_core::types::{Child, ChildKind, Counter, Group};
    use tally_settings::CounterMapping;

    use crate::mappings::MappingTable;
    use crate::reconciler::Reconciler;

    fn child(id: &str, parent: Option<&str>, name: &str) -> Child {
        Child {
            id: ChildId::from(id),
            parent_id: parent.map(GroupId::from),
            kind: ChildKind::Text,
            name: name.to_owned(),
        }
    }

    fn fixture() -> (Arc<MemoryDirectory>, ReconcileScheduler, EventDispatcher) {
        let dir = Arc::new(MemoryDirectory::new());
        for (group, counter) in [("g1", "c1"), ("g2", "c2")] {
            dir.insert_group(Group {
                id: GroupId::from(group),
                name: group.to_owned(),
            });
            dir.insert_counter(Counter {
                id: CounterId::from(counter),
                name: "tickets: 0".to_owned(),
            });
        }
        let table = Arc::new(MappingTable::from_settings(&[
            CounterMapping {
                group_id: "g1".to_owned(),
                counter_id: "c1".to_owned(),
            },
            CounterMapping {
                group_id: "g2".to_owned(),
                counter_id: "c2".to_owned(),
            },
        ]));
        let policy = MembershipPolicy::new(ChildKind::Text, &["closed".to_owned()], None);
        let reconciler = Reconciler::new(
            dir.clone(),
            table.clone(),
            policy,
            Duration::from_millis(500),
            false,
        );
        let scheduler =
            ReconcileScheduler::new(reconciler, table, 4, CancellationToken::new());
        let dispatcher = EventDispatcher::new(scheduler.clone());
        (dir, scheduler, dispatcher)
    }

    #[tokio::test]
    async fn created_child_reconciles_its_group() {
        let (dir, sched, dispatcher) = fixture();
        dir.seed_child(child("t1", Some("g1"), "ticket-1"));
        dispatcher.dispatch(&DirectoryEvent::ChildCreated(child(
            "t1",
            Some("g1"),
            "ticket-1",
        )));
        sched.wait_idle().await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 1");
    }

    #[tokio::test]
    async fn unmapped_group_event_produces_no_calls() {
        let (dir, sched, dispatcher) = fixture();
        dispatcher.dispatch(&DirectoryEvent::ChildCreated(child(
            "t1",
            Some("g9"),
            "ticket-1",
        )));
        sched.wait_idle().await;
        assert_eq!(dir.listing_calls(), 0);
        assert!(dir.rename_log().is_empty());
    }

    #[tokio::test]
    async fn orphan_child_event_is_ignored() {
        let (dir, sched, dispatcher) = fixture();
        dispatcher.dispatch(&DirectoryEvent::ChildDeleted(child("t1", None, "ticket-1")));
        sched.wait_idle().await;
        assert_eq!(dir.listing_calls(), 0);
    }

    #[tokio::test]
    async fn noop_rename_is_dropped() {
        let (dir, sched, dispatcher) = fixture();
        let snapshot = child("t1", Some("g1"), "ticket-1");
        dispatcher.dispatch(&DirectoryEvent::ChildRenamed {
            old: snapshot.clone(),
            new: snapshot,
        });
        sched.wait_idle().await;
        assert_eq!(dir.listing_calls(), 0);
    }

    #[tokio::test]
    async fn rename_with_text_change_reconciles() {
        let (dir, sched, dispatcher) = fixture();
        dir.seed_child(child("t1", Some("g1"), "closed-ticket-1"));
        dispatcher.dispatch(&DirectoryEvent::ChildRenamed {
            old: child("t1", Some("g1"), "ticket-1"),
            new: child("t1", Some("g1"), "closed-ticket-1"),
        });
        sched.wait_idle().await;
        // Counter stays at 0 (the ticket closed) — but the pass ran.
        assert_eq!(dir.listing_calls(), 1);
    }

    #[tokio::test]
    async fn move_between_groups_reconciles_both_sides() {
        let (dir, sched, dispatcher) = fixture();
        dir.seed_child(child("t1", Some("g2"), "ticket-1"));
        dispatcher.dispatch(&DirectoryEvent::ChildRenamed {
            old: child("t1", Some("g1"), "ticket-1"),
            new: child("t1", Some("g2"), "ticket-1"),
        });
        sched.wait_idle().await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 0");
        assert_eq!(dir.counter_name(&CounterId::from("c2")).unwrap(), "tickets: 1");
        assert_eq!(dir.listing_calls(), 2);
    }

    #[tokio::test]
    async fn move_from_unmapped_group_reconciles_only_mapped_side() {
        let (dir, sched, dispatcher) = fixture();
        dir.seed_child(child("t1", Some("g1"), "ticket-1"));
        dispatcher.dispatch(&DirectoryEvent::ChildRenamed {
            old: child("t1", Some("g9"), "ticket-1"),
            new: child("t1", Some("g1"), "ticket-1"),
        });
        sched.wait_idle().await;
        assert_eq!(dir.listing_calls(), 1);
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 1");
    }

    #[tokio::test]
    async fn run_loop_processes_broadcast_events() {
        let (dir, sched, dispatcher) = fixture();
        let cancel = CancellationToken::new();
        let rx = dir.subscribe();
        let task = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        dir.create_child(child("t1", Some("g1"), "ticket-1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        sched.wait_idle().await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 1");

        cancel.cancel();
        task.await.unwrap();
    }
}
