//! Stability monitoring
//!
//! After a batch is restored the cluster still has to allocate and
//! replicate it. [`StabilityMonitor`] blocks until every unit of the batch
//! reports the best distribution state.

mod monitor;

pub use monitor::{StabilityError, StabilityMonitor};
