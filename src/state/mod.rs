//! Restore state store
//!
//! One [`RestoreRecord`] per unit ever queued, in a three-state lifecycle:
//!
//! ```text
//! (absent) --upsert--> init --pipeline done--> restored
//!                       |  ^
//!               cancel  v  | re-queue
//!                    cancelled
//! ```
//!
//! The count of `init` records is the single-flight guard for whole runs.
//! Any failure reading or writing records is fatal to the caller.

mod backend;
mod errors;
mod record;
mod store;

pub use backend::{IndexRecordBackend, MemoryRecordBackend, RecordBackend};
pub use errors::{StateError, StateErrorCode, StateResult};
pub use record::{RestoreRecord, RestoreStatus};
pub use store::{RecordState, RestoreStateStore, UpsertOutcome};

/// Operator identity recorded as `requested_by`
pub fn current_operator() -> String {
    whoami::username()
}
