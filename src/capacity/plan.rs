//! Human-readable restore plan shown before confirmation

use std::fmt;

use serde::Serialize;

use super::node_map::NodeCapacityMap;
use super::planner::ShardBudget;
use crate::catalog::RestorableUnit;

/// Binary units, two decimals
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    for unit in UNITS.iter().take(UNITS.len() - 1) {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} {}", value, UNITS[UNITS.len() - 1])
}

/// Summary of what a confirmed run would do
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestorePlan {
    pub units: Vec<String>,
    pub total_shards: u64,
    pub total_bytes: u64,
    pub cluster_available_bytes: u64,
    pub cluster_total_bytes: u64,
    pub data_nodes: usize,
    pub average_shards_per_node: f64,
    pub batch_size: usize,
}

impl RestorePlan {
    /// `capacity` must be the map as built, before admission debits it
    pub fn new(
        units: &[RestorableUnit],
        capacity: &NodeCapacityMap,
        budget: &ShardBudget,
        batch_size: usize,
    ) -> Self {
        let average_shards_per_node = if budget.node_count == 0 {
            0.0
        } else {
            budget.current_shards as f64 / budget.node_count as f64
        };

        Self {
            units: units.iter().map(|u| u.source_unit_name.clone()).collect(),
            total_shards: units.iter().map(|u| u64::from(u.total_shards)).sum(),
            total_bytes: units.iter().map(|u| u.size_bytes).sum(),
            cluster_available_bytes: capacity.available_bytes(),
            cluster_total_bytes: capacity.total_bytes(),
            data_nodes: capacity.len(),
            average_shards_per_node,
            batch_size,
        }
    }

    pub fn batch_count(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        (self.units.len() + self.batch_size - 1) / self.batch_size
    }
}

impl fmt::Display for RestorePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Restore plan")?;
        writeln!(
            f,
            "  units:          {} in {} batch(es) of up to {}",
            self.units.len(),
            self.batch_count(),
            self.batch_size
        )?;
        for unit in &self.units {
            writeln!(f, "    - {}", unit)?;
        }
        writeln!(f, "  shards:         {}", self.total_shards)?;
        writeln!(f, "  size:           {}", format_bytes(self.total_bytes))?;
        writeln!(
            f,
            "  cluster space:  {} available of {}",
            format_bytes(self.cluster_available_bytes),
            format_bytes(self.cluster_total_bytes)
        )?;
        writeln!(f, "  data nodes:     {}", self.data_nodes)?;
        write!(f, "  shards / node:  {:.2}", self.average_shards_per_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::NodeCapacityEntry;
    use crate::gateway::Endpoint;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
        assert_eq!(format_bytes(3 * 1024u64.pow(5)), "3072.00 TB");
    }

    #[test]
    fn test_plan_summary() {
        let units = vec![
            RestorableUnit {
                snapshot_id: "snapshot_a".into(),
                source_unit_name: "a".into(),
                location: "dc1".into(),
                endpoint: Endpoint::new("es01", 9200),
                size_bytes: 1024,
                total_shards: 2,
                already_active: false,
            },
            RestorableUnit {
                snapshot_id: "snapshot_b".into(),
                source_unit_name: "b".into(),
                location: "dc1".into(),
                endpoint: Endpoint::new("es01", 9200),
                size_bytes: 2048,
                total_shards: 3,
                already_active: false,
            },
        ];
        let capacity = NodeCapacityMap::from_entries([NodeCapacityEntry {
            hostname: "n1".into(),
            total_bytes: 10 * 1024,
            available_bytes: 8 * 1024,
        }]);
        let shards: BTreeMap<String, u64> = [("n1".to_string(), 40)].into();
        let budget = ShardBudget::compute(&shards, 1000, &units);

        let plan = RestorePlan::new(&units, &capacity, &budget, 1);

        assert_eq!(plan.total_shards, 5);
        assert_eq!(plan.total_bytes, 3072);
        assert_eq!(plan.batch_count(), 2);
        assert_eq!(plan.average_shards_per_node, 40.0);

        let text = plan.to_string();
        assert!(text.contains("3.00 KB"));
        assert!(text.contains("8.00 KB available of 10.00 KB"));
        assert!(text.contains("    - b"));
    }
}
