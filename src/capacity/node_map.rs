//! Per-node disk accounting
//!
//! Built once per run from node statistics. Available bytes are reduced by
//! a fraction of each node's total so planning never drives a node to the
//! watermark the cluster itself considers unsafe.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::gateway::NodeStat;

/// One data-bearing node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeCapacityEntry {
    pub hostname: String,
    pub total_bytes: u64,
    /// Reported available bytes minus the safety margin, floored at zero
    pub available_bytes: u64,
}

/// Capacity of every data-bearing node, scanned in hostname order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeCapacityMap {
    nodes: BTreeMap<String, NodeCapacityEntry>,
}

impl NodeCapacityMap {
    /// Keep nodes holding any of `data_roles`; reserve `safety_margin` of
    /// each node's total bytes.
    pub fn build(stats: &[NodeStat], safety_margin: f64, data_roles: &[String]) -> Self {
        let nodes = stats
            .iter()
            .filter(|node| node.roles.iter().any(|role| data_roles.contains(role)))
            .map(|node| {
                let reserved = (node.total_bytes as f64 * safety_margin) as u64;
                (
                    node.hostname.clone(),
                    NodeCapacityEntry {
                        hostname: node.hostname.clone(),
                        total_bytes: node.total_bytes,
                        available_bytes: node.available_bytes.saturating_sub(reserved),
                    },
                )
            })
            .collect();

        Self { nodes }
    }

    /// Build directly from entries
    pub fn from_entries(entries: impl IntoIterator<Item = NodeCapacityEntry>) -> Self {
        Self {
            nodes: entries
                .into_iter()
                .map(|entry| (entry.hostname.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, hostname: &str) -> Option<&NodeCapacityEntry> {
        self.nodes.get(hostname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeCapacityEntry> {
        self.nodes.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeCapacityEntry> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.nodes.values().map(|n| n.total_bytes).sum()
    }

    pub fn available_bytes(&self) -> u64 {
        self.nodes.values().map(|n| n.available_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> Vec<String> {
        vec!["data_content".into(), "data_hot".into(), "data_warm".into()]
    }

    fn stat(hostname: &str, roles: &[&str], total: u64, available: u64) -> NodeStat {
        NodeStat {
            hostname: hostname.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            total_bytes: total,
            available_bytes: available,
        }
    }

    #[test]
    fn test_margin_subtracted_from_available() {
        let map = NodeCapacityMap::build(&[stat("n1", &["data_hot"], 1000, 700)], 0.20, &roles());

        let entry = map.get("n1").unwrap();
        assert_eq!(entry.total_bytes, 1000);
        assert_eq!(entry.available_bytes, 500);
    }

    #[test]
    fn test_non_data_nodes_excluded() {
        let map = NodeCapacityMap::build(
            &[
                stat("master", &["master"], 1000, 1000),
                stat("cold", &["data_cold"], 1000, 1000),
                stat("warm", &["data_warm", "ingest"], 1000, 900),
            ],
            0.20,
            &roles(),
        );

        assert_eq!(map.len(), 1);
        assert!(map.get("warm").is_some());
    }

    #[test]
    fn test_available_floors_at_zero() {
        let map = NodeCapacityMap::build(&[stat("full", &["data_content"], 1000, 100)], 0.20, &roles());
        assert_eq!(map.get("full").unwrap().available_bytes, 0);
    }

    #[test]
    fn test_totals() {
        let map = NodeCapacityMap::build(
            &[
                stat("a", &["data_hot"], 1000, 1000),
                stat("b", &["data_hot"], 500, 500),
            ],
            0.0,
            &roles(),
        );
        assert_eq!(map.total_bytes(), 1500);
        assert_eq!(map.available_bytes(), 1500);
    }
}
