//! # tally-core
//!
//! Domain types and pure logic for the tally counter-reconciliation engine:
//!
//! - Branded ID newtypes ([`GroupId`], [`CounterId`], [`ChildId`])
//! - Snapshot types for externally owned resources ([`Group`], [`Child`],
//!   [`Counter`])
//! - The [`Directory`] trait — the seam to the external service that owns
//!   every resource tally reads or mutates
//! - [`MemoryDirectory`] — a complete in-process backend for tests and the
//!   scenario replay harness
//! - [`MembershipPolicy`] and [`count_active`] — which children count
//! - [`render_label`] — how a count becomes a display name
//!
//! Everything here is side-effect free except the directory implementations;
//! the async engine lives in `tally-engine`.

#![deny(unsafe_code)]

pub mod directory;
pub mod events;
pub mod ids;
pub mod label;
pub mod membership;
pub mod memory;
pub mod types;

pub use directory::{Directory, DirectoryError};
pub use events::DirectoryEvent;
pub use ids::{ChildId, CounterId, GroupId};
pub use label::render_label;
pub use membership::{MembershipPolicy, count_active};
pub use memory::MemoryDirectory;
pub use types::{Child, ChildKind, Counter, Group};
