//! Observability for restorectl
//!
//! - Structured logging (one JSON object per line)
//! - Lifecycle events as a closed enum
//! - Scope-based BEGIN/COMPLETE tracing
//! - Append-only restore history
//!
//! # Principles
//!
//! 1. Logging never changes control flow
//! 2. No background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use restorectl::observability::{Event, Logger, ObservationScope};
//!
//! Logger::event(Event::CatalogMerged, &[("snapshots", "42")]);
//!
//! let scope = ObservationScope::new("DISCOVERY");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
pub mod history;
mod logger;
mod scope;

pub use events::Event;
pub use history::{
    ClusterHistoryLedger, FileHistoryLedger, HistoryEntry, HistoryError, HistoryLedger,
    HistoryStatus, MemoryHistoryLedger, TeeHistoryLedger,
};
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};
