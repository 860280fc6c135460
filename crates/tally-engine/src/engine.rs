//! Engine wiring and graceful shutdown.
//!
//! [`Engine::start`] assembles the mapping table, policy, reconciler,
//! scheduler, and dispatcher from validated settings, enqueues the startup
//! sweep, and spawns the two long-lived tasks (event loop, periodic sweep).
//! The startup sweep is enqueued *before* the event loop task exists, so an
//! event arriving at boot can only ever coalesce behind the startup pass —
//! it can never observe a counter no pass has primed.

use std::sync::Arc;
use std::time::Duration;

use tally_core::directory::Directory;
use tally_core::events::DirectoryEvent;
use tally_core::membership::MembershipPolicy;
use tally_settings::TallySettings;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::EventDispatcher;
use crate::mappings::MappingTable;
use crate::reconciler::Reconciler;
use crate::scheduler::{Reason, ReconcileScheduler};

/// Default timeout for graceful shutdown before abandoning tasks.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// A running reconciliation engine.
pub struct Engine {
    scheduler: ReconcileScheduler,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Wire up and start the engine. Settings must already be validated.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        directory: Arc<dyn Directory>,
        settings: &TallySettings,
        events: broadcast::Receiver<DirectoryEvent>,
    ) -> Self {
        let mappings = Arc::new(MappingTable::from_settings(&settings.mappings));
        let policy = MembershipPolicy::new(
            settings.classifier.countable_kind,
            &settings.classifier.terminal_prefixes,
            settings.classifier.tracked_prefixes.as_deref(),
        );
        let cancel = CancellationToken::new();
        let reconciler = Reconciler::new(
            directory,
            mappings.clone(),
            policy,
            Duration::from_millis(settings.scheduler.call_timeout_ms),
            settings.scheduler.pin_counters,
        );
        let scheduler = ReconcileScheduler::new(
            reconciler,
            mappings.clone(),
            settings.scheduler.max_concurrent,
            cancel.clone(),
        );

        info!(groups = mappings.len(), "starting engine");
        scheduler.enqueue_sweep(Reason::Startup);

        let dispatcher = EventDispatcher::new(scheduler.clone());
        let sweep_interval = Duration::from_secs(settings.scheduler.sweep_interval_secs);
        let handles = vec![
            tokio::spawn(dispatcher.run(events, cancel.clone())),
            tokio::spawn({
                let scheduler = scheduler.clone();
                async move { scheduler.run_periodic(sweep_interval).await }
            }),
        ];

        Self {
            scheduler,
            cancel,
            handles,
        }
    }

    /// The scheduler, for direct enqueueing and idle observation.
    #[must_use]
    pub fn scheduler(&self) -> &ReconcileScheduler {
        &self.scheduler
    }

    /// Stop accepting work, then wait up to `timeout` for the long-lived
    /// tasks to drain. In-flight passes run to completion.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.cancel.cancel();
        info!(
            task_count = self.handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for engine tasks"
        );
        let drain = futures::future::join_all(self.handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ids::{ChildId, CounterId, GroupId};
    use tally_core::memory::MemoryDirectory;
    use tally_core::types::{Child, ChildKind, Counter, Group};
    use tally_settings::CounterMapping;

    fn settings() -> TallySettings {
        let mut settings = TallySettings {
            mappings: vec![CounterMapping {
                group_id: "g1".to_owned(),
                counter_id: "c1".to_owned(),
            }],
            ..Default::default()
        };
        settings.scheduler.pin_counters = false;
        settings
    }

    fn seeded() -> Arc<MemoryDirectory> {
        let dir = Arc::new(MemoryDirectory::new());
        dir.insert_group(Group {
            id: GroupId::from("g1"),
            name: "Tier 1".to_owned(),
        });
        dir.insert_counter(Counter {
            id: CounterId::from("c1"),
            name: "tickets: 0".to_owned(),
        });
        dir
    }

    fn child(id: &str, name: &str) -> Child {
        Child {
            id: ChildId::from(id),
            parent_id: Some(GroupId::from("g1")),
            kind: ChildKind::Text,
            name: name.to_owned(),
        }
    }

    #[tokio::test]
    async fn startup_sweep_primes_counters() {
        let dir = seeded();
        dir.seed_child(child("t1", "ticket-1"));
        let engine = Engine::start(dir.clone(), &settings(), dir.subscribe());
        engine.scheduler().wait_idle().await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 1");
        engine.shutdown(Some(Duration::from_secs(1))).await;
    }

    #[tokio::test]
    async fn events_drive_reconciliation_after_startup() {
        let dir = seeded();
        let engine = Engine::start(dir.clone(), &settings(), dir.subscribe());
        engine.scheduler().wait_idle().await;

        dir.create_child(child("t1", "ticket-1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.scheduler().wait_idle().await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 1");
        engine.shutdown(Some(Duration::from_secs(1))).await;
    }

    #[tokio::test]
    async fn shutdown_stops_tasks() {
        let dir = seeded();
        let engine = Engine::start(dir.clone(), &settings(), dir.subscribe());
        engine.scheduler().wait_idle().await;
        engine.shutdown(Some(Duration::from_secs(1))).await;
        // Past this point the event loop is gone; a new event changes nothing.
        dir.create_child(child("t1", "ticket-1"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(dir.counter_name(&CounterId::from("c1")).unwrap(), "tickets: 0");
    }
}
