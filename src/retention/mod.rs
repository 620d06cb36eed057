//! Retention
//!
//! Restored units are temporary. Once a record is old enough the unit is
//! deleted from every location and the record removed.

mod purge;

pub use purge::{PurgeError, PurgeReport, RetentionPurger};
