//! Admission planning
//!
//! A pure simulation. Nothing here talks to the cluster; it only decides,
//! before anything destructive happens, whether the candidate set fits.

use std::collections::BTreeMap;

use serde::Serialize;

use super::node_map::NodeCapacityMap;
use crate::catalog::RestorableUnit;

/// First-fit placement result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub admitted: Vec<RestorableUnit>,
    pub rejected: Vec<RestorableUnit>,
    /// Unit name to the node it was planned onto
    pub assignments: BTreeMap<String, String>,
}

/// First-fit admission.
///
/// Candidates are taken in input order; nodes are scanned in hostname
/// order. A candidate goes to the first node with strictly more available
/// bytes than its size and that node is debited. The map is the simulation
/// ledger and is left debited.
pub fn admit(candidates: &[RestorableUnit], capacity: &mut NodeCapacityMap) -> Placement {
    let mut placement = Placement::default();

    for candidate in candidates {
        let target = capacity
            .iter_mut()
            .find(|node| node.available_bytes > candidate.size_bytes);

        match target {
            Some(node) => {
                node.available_bytes -= candidate.size_bytes;
                placement
                    .assignments
                    .insert(candidate.source_unit_name.clone(), node.hostname.clone());
                placement.admitted.push(candidate.clone());
            }
            None => placement.rejected.push(candidate.clone()),
        }
    }

    placement
}

/// Cluster-wide shard budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardBudget {
    pub node_count: u64,
    pub max_shards_per_node: u64,
    pub current_shards: u64,
    /// `node_count * max_shards_per_node - current_shards`, negative when
    /// the cluster is already over its limit
    pub remaining: i64,
    pub requested: u64,
    /// Nodes already at or above the per-node limit
    pub saturated_nodes: Vec<String>,
}

impl ShardBudget {
    /// Compute the budget from live shard placement
    pub fn compute(
        shards_per_node: &BTreeMap<String, u64>,
        max_shards_per_node: u64,
        candidates: &[RestorableUnit],
    ) -> Self {
        let node_count = shards_per_node.len() as u64;
        let current_shards: u64 = shards_per_node.values().sum();
        let capacity = node_count.saturating_mul(max_shards_per_node);
        let remaining = capacity as i64 - current_shards as i64;
        let requested = candidates.iter().map(|c| u64::from(c.total_shards)).sum();
        let saturated_nodes = shards_per_node
            .iter()
            .filter(|(_, count)| **count >= max_shards_per_node)
            .map(|(node, _)| node.clone())
            .collect();

        Self {
            node_count,
            max_shards_per_node,
            current_shards,
            remaining,
            requested,
            saturated_nodes,
        }
    }

    /// The whole candidate set is rejected when its shards exceed the budget
    pub fn is_exceeded(&self) -> bool {
        self.requested as i64 > self.remaining
    }
}

/// Outcome of both admission checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReport {
    pub placement: Placement,
    pub shard_budget: ShardBudget,
}

impl AdmissionReport {
    /// Run both checks. Capacity runs even when the shard budget fails so
    /// the report shows both outcomes.
    pub fn evaluate(
        candidates: &[RestorableUnit],
        capacity: &mut NodeCapacityMap,
        shards_per_node: &BTreeMap<String, u64>,
        max_shards_per_node: u64,
    ) -> Self {
        let shard_budget = ShardBudget::compute(shards_per_node, max_shards_per_node, candidates);
        let placement = admit(candidates, capacity);
        Self {
            placement,
            shard_budget,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.shard_budget.is_exceeded() || !self.placement.rejected.is_empty()
    }

    /// Every candidate when the shard budget failed, else the capacity rejects
    pub fn rejected_units(&self) -> Vec<String> {
        if self.shard_budget.is_exceeded() {
            self.placement
                .admitted
                .iter()
                .chain(self.placement.rejected.iter())
                .map(|u| u.source_unit_name.clone())
                .collect()
        } else {
            self.placement
                .rejected
                .iter()
                .map(|u| u.source_unit_name.clone())
                .collect()
        }
    }

    pub fn admitted_count(&self) -> usize {
        if self.shard_budget.is_exceeded() {
            0
        } else {
            self.placement.admitted.len()
        }
    }
}
