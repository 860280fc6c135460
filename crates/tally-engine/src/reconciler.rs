//! The per-group reconciliation pass.
//!
//! One pass walks `Idle → Fetching → Computing → (NoChange | Writing)` and
//! never caches anything across passes: the group, the children snapshot,
//! and the counter name are all re-fetched every time, so a pass can only
//! ever clobber the counter name with a value derived from fresher state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tally_core::directory::{Directory, DirectoryError};
use tally_core::ids::{CounterId, GroupId};
use tally_core::label::render_label;
use tally_core::membership::{MembershipPolicy, count_active};
use tracing::{debug, info, instrument, warn};

use crate::errors::ReconcileError;
use crate::mappings::MappingTable;

/// Why a pass did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The group has no configured counter.
    Unmapped,
    /// The group, counter, or children listing could not be resolved right
    /// now (missing or transient fetch failure). The next sweep retries.
    MissingResource,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmapped => f.write_str("unmapped"),
            Self::MissingResource => f.write_str("missing-resource"),
        }
    }
}

/// Outcome of a completed pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The counter name was rewritten.
    Updated {
        /// The name that was written.
        name: String,
    },
    /// The counter already displayed the correct count; no write issued.
    Unchanged,
    /// The pass did nothing.
    Skipped(SkipReason),
}

/// Executes reconciliation passes against the directory.
pub struct Reconciler {
    directory: Arc<dyn Directory>,
    mappings: Arc<MappingTable>,
    policy: MembershipPolicy,
    call_timeout: Duration,
    pin_counters: bool,
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        mappings: Arc<MappingTable>,
        policy: MembershipPolicy,
        call_timeout: Duration,
        pin_counters: bool,
    ) -> Self {
        Self {
            directory,
            mappings,
            policy,
            call_timeout,
            pin_counters,
        }
    }

    /// Run one pass for `group`.
    ///
    /// Read failures are absorbed as [`SkipReason::MissingResource`]; only a
    /// failed write-back is an error. Exactly one rename call is ever issued
    /// per pass, and none when the rendered name already matches.
    #[instrument(skip(self), fields(group = %group))]
    pub async fn reconcile(&self, group: &GroupId) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(counter_id) = self.mappings.counter_for(group) else {
            debug!("group has no configured counter");
            return Ok(ReconcileOutcome::Skipped(SkipReason::Unmapped));
        };

        let Some(_group_info) = self.read("fetch_group", self.directory.fetch_group(group)).await
        else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::MissingResource));
        };
        let Some(children) = self
            .read("list_children", self.directory.list_children(group))
            .await
        else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::MissingResource));
        };
        // The counter is fetched last so the name used for the compare is as
        // fresh as possible before the write decision.
        let Some(counter) = self
            .read("fetch_counter", self.directory.fetch_counter(counter_id))
            .await
        else {
            return Ok(ReconcileOutcome::Skipped(SkipReason::MissingResource));
        };

        let count = count_active(&children, group, counter_id, &self.policy);
        let new_name = render_label(&counter.name, count);
        if new_name == counter.name {
            debug!(count, "counter already up to date");
            return Ok(ReconcileOutcome::Unchanged);
        }

        match tokio::time::timeout(
            self.call_timeout,
            self.directory.set_counter_name(counter_id, &new_name),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(ReconcileError::WriteRejected {
                    counter: counter_id.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(ReconcileError::WriteTimeout {
                    counter: counter_id.clone(),
                    timeout_ms: timeout_ms(self.call_timeout),
                });
            }
        }
        info!(count, from = %counter.name, to = %new_name, "counter renamed");

        if self.pin_counters {
            self.pin(counter_id).await;
        }

        Ok(ReconcileOutcome::Updated { name: new_name })
    }

    /// Best-effort pin of the counter to the top of its group. Failure is
    /// logged and never affects the pass outcome.
    async fn pin(&self, counter: &CounterId) {
        match tokio::time::timeout(
            self.call_timeout,
            self.directory.set_counter_position(counter, 0),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%counter, %err, "pinning counter failed"),
            Err(_) => warn!(%counter, "pinning counter timed out"),
        }
    }

    async fn read<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err @ DirectoryError::NotFound { .. })) => {
                debug!(op, %err, "resource missing");
                None
            }
            Ok(Err(err)) => {
                warn!(op, %err, "read failed");
                None
            }
            Err(_) => {
                warn!(op, timeout_ms = timeout_ms(self.call_timeout), "read timed out");
                None
            }
        }
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
