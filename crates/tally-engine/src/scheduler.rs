//! Request scheduling: per-group serialization, coalescing, and the sweep.
//!
//! Every group has one slot. An idle group starts a pass immediately; a
//! running group absorbs further requests into a single pending follow-up
//! (duplicates beyond that are dropped — only the latest state matters, and
//! a pass always re-reads everything). The follow-up runs in the same task
//! as the pass that absorbed it, so two passes for one group can never
//! overlap. A global semaphore caps passes in flight across all groups to
//! respect directory rate limits.
//!
//! Enqueueing is synchronous and never blocks, so the event-delivery path
//! stays responsive while passes are in flight.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tally_core::ids::GroupId;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mappings::MappingTable;
use crate::reconciler::{ReconcileOutcome, Reconciler};

/// What triggered a reconciliation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    /// Initial sweep before event handling becomes active.
    Startup,
    /// A child lifecycle event.
    Event,
    /// The periodic drift-correction sweep.
    Periodic,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Event => f.write_str("event"),
            Self::Periodic => f.write_str("periodic"),
        }
    }
}

/// One unit of reconciliation work. Consumed by the scheduler and discarded.
#[derive(Clone, Debug)]
pub struct ReconcileRequest {
    /// The group to reconcile.
    pub group: GroupId,
    /// What triggered the request.
    pub reason: Reason,
}

#[derive(Default)]
struct Slot {
    running: bool,
    pending: Option<Reason>,
}

struct SchedulerInner {
    reconciler: Reconciler,
    mappings: Arc<MappingTable>,
    slots: DashMap<GroupId, Slot>,
    permits: Semaphore,
    cancel: CancellationToken,
}

/// Schedules reconciliation passes. Cheap to clone.
#[derive(Clone)]
pub struct ReconcileScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReconcileScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(
        reconciler: Reconciler,
        mappings: Arc<MappingTable>,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                reconciler,
                mappings,
                slots: DashMap::new(),
                permits: Semaphore::new(max_concurrent),
                cancel,
            }),
        }
    }

    /// Enqueue a request. Synchronous, never blocks.
    ///
    /// If a pass for the group is already in flight the request collapses
    /// into its single pending follow-up; further requests are dropped.
    pub fn enqueue(&self, request: ReconcileRequest) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let ReconcileRequest { group, reason } = request;
        {
            let mut slot = self.inner.slots.entry(group.clone()).or_default();
            if slot.running {
                if slot.pending.is_none() {
                    slot.pending = Some(reason);
                    debug!(group = %group, %reason, "pass in flight, queued follow-up");
                }
                return;
            }
            slot.running = true;
        }
        let inner = self.inner.clone();
        let _ = tokio::spawn(run_group(inner, group, reason));
    }

    /// Enqueue one request per configured group.
    pub fn enqueue_sweep(&self, reason: Reason) {
        for group in self.inner.mappings.groups() {
            self.enqueue(ReconcileRequest {
                group: group.clone(),
                reason,
            });
        }
    }

    /// Drive the periodic drift-correction sweep until cancelled.
    ///
    /// The first sweep fires one full `interval` after this is called — the
    /// startup sweep already covered time zero.
    pub async fn run_periodic(&self, interval: Duration) {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!(groups = self.inner.mappings.len(), "periodic sweep");
                    self.enqueue_sweep(Reason::Periodic);
                }
                () = self.inner.cancel.cancelled() => break,
            }
        }
    }

    /// Whether `group` has a configured counter.
    #[must_use]
    pub fn tracks(&self, group: &GroupId) -> bool {
        self.inner.mappings.contains(group)
    }

    /// Whether no pass is running or pending for any group.
    #[must_use]
    pub fn idle(&self) -> bool {
        self.inner
            .slots
            .iter()
            .all(|slot| !slot.running && slot.pending.is_none())
    }

    /// Wait until the scheduler is idle. Observation helper for tests and
    /// the replay harness; not needed in steady-state operation.
    pub async fn wait_idle(&self) {
        while !self.idle() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Pass loop for one group. Runs passes back-to-back while follow-ups keep
/// arriving, then releases the slot.
async fn run_group(inner: Arc<SchedulerInner>, group: GroupId, mut reason: Reason) {
    loop {
        let permit = tokio::select! {
            permit = inner.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            () = inner.cancel.cancelled() => break,
        };

        match inner.reconciler.reconcile(&group).await {
            Ok(ReconcileOutcome::Updated { name }) => {
                debug!(group = %group, %reason, %name, "pass updated counter");
            }
            Ok(ReconcileOutcome::Unchanged) => {
                debug!(group = %group, %reason, "pass found counter current");
            }
            Ok(ReconcileOutcome::Skipped(skip)) => {
                debug!(group = %group, %reason, %skip, "pass skipped");
            }
            Err(err) => {
                warn!(group = %group, %reason, %err, "pass failed; next sweep retries");
            }
        }
        drop(permit);

        let next = {
            let Some(mut slot) = inner.slots.get_mut(&group) else {
                break;
            };
            match slot.pending.take() {
                Some(queued) => Some(queued),
                None => {
                    slot.running = false;
                    None
                }
            }
        };
        match next {
            Some(queued) if !inner.cancel.is_cancelled() => reason = queued,
            _ => break,
        }
    }
}
