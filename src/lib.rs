//! restorectl - capacity-aware restore of snapshotted units
//!
//! Finds the newest snapshot per series at or before a target date, checks
//! disk headroom and the per-node shard budget, then restores in batches
//! and makes each unit queryable. A record per unit in the cluster itself
//! keeps concurrent operators from running over each other.

pub mod capacity;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod observability;
pub mod orchestrator;
pub mod retention;
pub mod stability;
pub mod state;
