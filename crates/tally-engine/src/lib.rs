//! # tally-engine
//!
//! The reconciliation engine that keeps counter labels equal to the live
//! count of active children in their mapped groups:
//!
//! - [`MappingTable`] — immutable group-to-counter bindings
//! - [`Reconciler`] — one fetch/count/render/compare/write pass
//! - [`ReconcileScheduler`] — per-group serialization, request coalescing,
//!   a global concurrency cap, and the periodic drift-correction sweep
//! - [`EventDispatcher`] — maps directory events to reconciliation requests
//! - [`Engine`] — wiring facade with graceful shutdown
//!
//! The engine holds no authoritative state between passes; every pass
//! re-reads the directory, so a missed or reordered event is at worst stale
//! until the next sweep.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod mappings;
pub mod reconciler;
pub mod scheduler;

pub use dispatcher::EventDispatcher;
pub use engine::Engine;
pub use errors::ReconcileError;
pub use mappings::MappingTable;
pub use reconciler::{ReconcileOutcome, Reconciler, SkipReason};
pub use scheduler::{Reason, ReconcileRequest, ReconcileScheduler};
