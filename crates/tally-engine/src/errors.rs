//! Engine error types.
//!
//! Only write-back failures surface as errors; read failures degrade to a
//! skipped pass because the periodic sweep retries them for free.

use tally_core::directory::DirectoryError;
use tally_core::ids::CounterId;
use thiserror::Error;

/// A reconciliation pass failed at the write-back step.
///
/// Never retried within the pass; the next sweep is the retry mechanism.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The rename call was rejected by the directory.
    #[error("renaming counter {counter} failed: {source}")]
    WriteRejected {
        /// The counter whose rename failed.
        counter: CounterId,
        /// The underlying directory error.
        #[source]
        source: DirectoryError,
    },
    /// The rename call did not complete within the per-call timeout.
    #[error("renaming counter {counter} timed out after {timeout_ms}ms")]
    WriteTimeout {
        /// The counter whose rename timed out.
        counter: CounterId,
        /// The configured per-call timeout.
        timeout_ms: u64,
    },
}
