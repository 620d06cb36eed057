//! Capacity accounting and admission control
//!
//! [`NodeCapacityMap`] is a per-run, in-memory ledger of data-node disk
//! space. [`AdmissionReport::evaluate`] runs first-fit placement over it and
//! the cluster-wide shard budget check. A run proceeds only when neither
//! check rejects anything.

mod node_map;
mod plan;
mod planner;

pub use node_map::{NodeCapacityEntry, NodeCapacityMap};
pub use plan::{format_bytes, RestorePlan};
pub use planner::{admit, AdmissionReport, Placement, ShardBudget};
