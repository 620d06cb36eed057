//! In-process cluster used by tests and dry wiring.
//!
//! Every [`MemoryGateway`] cloned from the same root (or created with
//! [`MemoryGateway::at_endpoint`]) shares one simulated cluster, so a
//! location with several ports behaves like a single logical cluster.
//! All calls are recorded in order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::errors::{GatewayError, GatewayResult};
use super::types::{
    ClusterHealth, DistributionState, Document, DocumentQuery, Endpoint, HealthColor, NodeStat,
    RestoreAck, RestoreOptions, SnapshotListing,
};
use super::ClusterGateway;

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub endpoint: Endpoint,
    pub op: &'static str,
    pub target: String,
    /// True for calls that change anything, documents included
    pub mutating: bool,
}

const DOCUMENT_WRITES: [&str; 3] = ["put_document", "append_document", "delete_document"];

impl GatewayCall {
    /// A record or history write rather than a change to a unit
    pub fn is_document_write(&self) -> bool {
        DOCUMENT_WRITES.contains(&self.op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUnit {
    pub replicas: u32,
    pub hidden: bool,
    pub lifecycle_policy: bool,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: String,
    target: Option<String>,
    error: GatewayError,
    remaining: Option<u32>,
}

#[derive(Debug)]
struct ClusterState {
    snapshots: BTreeMap<Endpoint, Vec<SnapshotListing>>,
    snapshot_units: BTreeMap<String, String>,
    snapshot_sizes: BTreeMap<String, u64>,
    live: BTreeMap<String, LiveUnit>,
    health: ClusterHealth,
    nodes: Vec<NodeStat>,
    shards: BTreeMap<String, u64>,
    distribution: BTreeMap<String, VecDeque<GatewayResult<DistributionState>>>,
    documents: BTreeMap<String, BTreeMap<String, Value>>,
    unreachable: BTreeSet<Endpoint>,
    failures: Vec<InjectedFailure>,
    calls: Vec<GatewayCall>,
    next_document_id: u64,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            snapshots: BTreeMap::new(),
            snapshot_units: BTreeMap::new(),
            snapshot_sizes: BTreeMap::new(),
            live: BTreeMap::new(),
            health: ClusterHealth {
                status: HealthColor::Green,
                number_of_nodes: 0,
                number_of_data_nodes: 0,
                active_shards: 0,
                relocating_shards: 0,
                initializing_shards: 0,
                unassigned_shards: 0,
            },
            nodes: Vec::new(),
            shards: BTreeMap::new(),
            distribution: BTreeMap::new(),
            documents: BTreeMap::new(),
            unreachable: BTreeSet::new(),
            failures: Vec::new(),
            calls: Vec::new(),
            next_document_id: 1,
        }
    }
}

/// Simulated cluster endpoint
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    endpoint: Endpoint,
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryGateway {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: Arc::new(Mutex::new(ClusterState::default())),
        }
    }

    /// Another endpoint of the same simulated cluster
    pub fn at_endpoint(&self, endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        // A poisoned lock only happens after a test already panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---------------------------------------------------------------------
    // Fixture builders
    // ---------------------------------------------------------------------

    /// Publish a snapshot on this endpoint that restores `unit`
    pub fn add_snapshot(&self, snapshot_id: &str, unit: &str, total_shards: u32, size_bytes: u64) {
        let mut state = self.state();
        state
            .snapshots
            .entry(self.endpoint.clone())
            .or_default()
            .push(SnapshotListing {
                id: snapshot_id.to_string(),
                status: "SUCCESS".to_string(),
                total_shards,
            });
        state.snapshot_units.insert(snapshot_id.to_string(), unit.to_string());
        state.snapshot_sizes.insert(snapshot_id.to_string(), size_bytes);
    }

    pub fn add_live_unit(&self, unit: &str) {
        self.state().live.insert(
            unit.to_string(),
            LiveUnit {
                replicas: 1,
                hidden: false,
                lifecycle_policy: true,
            },
        );
    }

    /// Add a node; `shards` copies are counted against it
    pub fn add_node(&self, hostname: &str, roles: &[&str], total_bytes: u64, available_bytes: u64, shards: u64) {
        let mut state = self.state();
        state.nodes.push(NodeStat {
            hostname: hostname.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            total_bytes,
            available_bytes,
        });
        state.shards.insert(hostname.to_string(), shards);
        state.health.number_of_nodes += 1;
        state.health.active_shards += shards;
    }

    pub fn set_health(&self, status: HealthColor) {
        self.state().health.status = status;
    }

    /// Answers for successive distribution polls of `unit`; once drained
    /// the unit reports green.
    pub fn script_distribution(&self, unit: &str, answers: Vec<GatewayResult<DistributionState>>) {
        self.state()
            .distribution
            .insert(unit.to_string(), answers.into_iter().collect());
    }

    pub fn set_unreachable(&self, endpoint: &Endpoint) {
        self.state().unreachable.insert(endpoint.clone());
    }

    /// Make every call of `op` (optionally only for `target`) fail
    pub fn fail_on(&self, op: &str, target: Option<&str>, error: GatewayError) {
        self.push_failure(op, target, error, None);
    }

    /// Make the next call of `op` fail once
    pub fn fail_once(&self, op: &str, target: Option<&str>, error: GatewayError) {
        self.push_failure(op, target, error, Some(1));
    }

    fn push_failure(&self, op: &str, target: Option<&str>, error: GatewayError, remaining: Option<u32>) {
        self.state().failures.push(InjectedFailure {
            op: op.to_string(),
            target: target.map(str::to_string),
            error,
            remaining,
        });
    }

    pub fn insert_document(&self, index: &str, id: &str, source: Value) {
        self.state()
            .documents
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), source);
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<GatewayCall> {
        self.state().calls.iter().filter(|c| c.mutating).cloned().collect()
    }

    /// Targets of every call to `op`, in order
    pub fn targets_of(&self, op: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn live_unit(&self, unit: &str) -> Option<LiveUnit> {
        self.state().live.get(unit).cloned()
    }

    pub fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        self.state().documents.get(index).cloned().unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Call plumbing
    // ---------------------------------------------------------------------

    /// Record the call, then apply reachability and injected failures
    fn enter(&self, op: &'static str, target: &str, mutating: bool) -> GatewayResult<MutexGuard<'_, ClusterState>> {
        let mut state = self.state();
        state.calls.push(GatewayCall {
            endpoint: self.endpoint.clone(),
            op,
            target: target.to_string(),
            mutating,
        });

        if state.unreachable.contains(&self.endpoint) {
            return Err(GatewayError::Unreachable {
                endpoint: self.endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let hit = state.failures.iter().position(|f| {
            f.op == op && f.target.as_deref().map_or(true, |t| t == target)
        });
        if let Some(idx) = hit {
            let error = state.failures[idx].error.clone();
            if let Some(ref mut remaining) = state.failures[idx].remaining {
                *remaining -= 1;
                if *remaining == 0 {
                    state.failures.remove(idx);
                }
            }
            return Err(error);
        }

        Ok(state)
    }
}

fn missing_unit(unit: &str) -> GatewayError {
    GatewayError::NotFound(format!("unit {}", unit))
}

impl ClusterGateway for MemoryGateway {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn ping(&self) -> GatewayResult<bool> {
        self.enter("ping", "", false).map(|_| true)
    }

    fn list_snapshots(&self, repository: &str) -> GatewayResult<Vec<SnapshotListing>> {
        let state = self.enter("list_snapshots", repository, false)?;
        Ok(state.snapshots.get(&self.endpoint).cloned().unwrap_or_default())
    }

    fn snapshot_size(&self, _repository: &str, snapshot_id: &str) -> GatewayResult<u64> {
        let state = self.enter("snapshot_size", snapshot_id, false)?;
        state
            .snapshot_sizes
            .get(snapshot_id)
            .copied()
            .ok_or_else(|| GatewayError::NotFound(format!("snapshot {}", snapshot_id)))
    }

    fn live_units(&self) -> GatewayResult<Vec<String>> {
        let state = self.enter("live_units", "", false)?;
        Ok(state.live.keys().cloned().collect())
    }

    fn cluster_health(&self) -> GatewayResult<ClusterHealth> {
        let state = self.enter("cluster_health", "", false)?;
        Ok(state.health.clone())
    }

    fn node_stats(&self) -> GatewayResult<Vec<NodeStat>> {
        let state = self.enter("node_stats", "", false)?;
        Ok(state.nodes.clone())
    }

    fn shards_per_node(&self) -> GatewayResult<BTreeMap<String, u64>> {
        let state = self.enter("shards_per_node", "", false)?;
        Ok(state.shards.clone())
    }

    fn restore_snapshot(
        &self,
        _repository: &str,
        snapshot_id: &str,
        _options: RestoreOptions,
    ) -> GatewayResult<RestoreAck> {
        let mut state = self.enter("restore_snapshot", snapshot_id, true)?;
        let unit = state
            .snapshot_units
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("snapshot {}", snapshot_id)))?;
        if state.live.contains_key(&unit) {
            return Err(GatewayError::UnitAlreadyExists { unit });
        }
        state.live.insert(
            unit,
            LiveUnit {
                replicas: 1,
                hidden: true,
                lifecycle_policy: true,
            },
        );
        Ok(RestoreAck { accepted: true })
    }

    fn remove_lifecycle_policy(&self, unit: &str) -> GatewayResult<()> {
        let mut state = self.enter("remove_lifecycle_policy", unit, true)?;
        let live = state.live.get_mut(unit).ok_or_else(|| missing_unit(unit))?;
        live.lifecycle_policy = false;
        Ok(())
    }

    fn set_replica_count(&self, unit: &str, count: u32) -> GatewayResult<()> {
        let mut state = self.enter("set_replica_count", unit, true)?;
        let live = state.live.get_mut(unit).ok_or_else(|| missing_unit(unit))?;
        live.replicas = count;
        Ok(())
    }

    fn set_visibility(&self, unit: &str, hidden: bool) -> GatewayResult<()> {
        let mut state = self.enter("set_visibility", unit, true)?;
        let live = state.live.get_mut(unit).ok_or_else(|| missing_unit(unit))?;
        live.hidden = hidden;
        Ok(())
    }

    fn delete_unit(&self, unit: &str) -> GatewayResult<bool> {
        let mut state = self.enter("delete_unit", unit, true)?;
        Ok(state.live.remove(unit).is_some())
    }

    fn unit_distribution_state(&self, unit: &str) -> GatewayResult<DistributionState> {
        let mut state = self.enter("unit_distribution_state", unit, false)?;
        if let Some(answer) = state.distribution.get_mut(unit).and_then(|q| q.pop_front()) {
            return answer;
        }
        if state.live.contains_key(unit) {
            Ok(HealthColor::Green)
        } else {
            Err(missing_unit(unit))
        }
    }

    fn search_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<Vec<Document>> {
        let state = self.enter("search_documents", index, false)?;
        Ok(state
            .documents
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, source)| query.matches(source))
                    .map(|(id, source)| Document {
                        id: id.clone(),
                        source: source.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<u64> {
        let state = self.enter("count_documents", index, false)?;
        Ok(state
            .documents
            .get(index)
            .map(|docs| docs.values().filter(|source| query.matches(source)).count() as u64)
            .unwrap_or(0))
    }

    fn get_document(&self, index: &str, id: &str) -> GatewayResult<Option<Document>> {
        let state = self.enter("get_document", id, false)?;
        Ok(state
            .documents
            .get(index)
            .and_then(|docs| docs.get(id))
            .map(|source| Document {
                id: id.to_string(),
                source: source.clone(),
            }))
    }

    fn put_document(&self, index: &str, id: &str, source: &Value) -> GatewayResult<()> {
        let mut state = self.enter("put_document", id, true)?;
        state
            .documents
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), source.clone());
        Ok(())
    }

    fn append_document(&self, index: &str, source: &Value) -> GatewayResult<String> {
        let mut state = self.enter("append_document", index, true)?;
        let id = format!("doc-{}", state.next_document_id);
        state.next_document_id += 1;
        state
            .documents
            .entry(index.to_string())
            .or_default()
            .insert(id.clone(), source.clone());
        Ok(id)
    }

    fn delete_document(&self, index: &str, id: &str) -> GatewayResult<bool> {
        let mut state = self.enter("delete_document", id, true)?;
        Ok(state
            .documents
            .get_mut(index)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> MemoryGateway {
        MemoryGateway::new(Endpoint::new("es01", 9200))
    }

    #[test]
    fn test_restore_creates_hidden_unit_then_conflicts() {
        let gw = gateway();
        gw.add_snapshot("snapshot_logs-a-2024.01.01", "logs-a-2024.01.01", 1, 10);

        gw.restore_snapshot("repo", "snapshot_logs-a-2024.01.01", RestoreOptions::default())
            .unwrap();
        assert!(gw.live_unit("logs-a-2024.01.01").unwrap().hidden);

        let err = gw
            .restore_snapshot("repo", "snapshot_logs-a-2024.01.01", RestoreOptions::default())
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(gw.mutating_calls().len(), 2);
    }

    #[test]
    fn test_endpoints_share_cluster_but_not_listings() {
        let a = gateway();
        let b = a.at_endpoint(Endpoint::new("es01", 9201));
        b.add_snapshot("snapshot_x", "x", 1, 1);
        a.add_live_unit("y");

        assert!(a.list_snapshots("repo").unwrap().is_empty());
        assert_eq!(b.list_snapshots("repo").unwrap().len(), 1);
        assert_eq!(b.live_units().unwrap(), vec!["y".to_string()]);
    }

    #[test]
    fn test_fail_once_then_recovers() {
        let gw = gateway();
        gw.add_live_unit("u");
        gw.fail_once("set_visibility", Some("u"), GatewayError::Timeout("t".into()));

        assert!(gw.set_visibility("u", false).is_err());
        assert!(gw.set_visibility("u", false).is_ok());
    }

    #[test]
    fn test_scripted_distribution() {
        let gw = gateway();
        gw.add_live_unit("u");
        gw.script_distribution(
            "u",
            vec![Ok(HealthColor::Red), Err(GatewayError::Timeout("poll".into()))],
        );
        assert_eq!(gw.unit_distribution_state("u").unwrap(), HealthColor::Red);
        assert!(gw.unit_distribution_state("u").is_err());
        assert_eq!(gw.unit_distribution_state("u").unwrap(), HealthColor::Green);
    }

    #[test]
    fn test_document_writes_are_mutations() {
        let gw = gateway();
        gw.put_document("idx", "a", &serde_json::json!({ "n": 1 })).unwrap();
        gw.append_document("idx", &serde_json::json!({ "n": 2 })).unwrap();
        gw.delete_document("idx", "a").unwrap();
        gw.get_document("idx", "a").unwrap();

        let writes = gw.mutating_calls();
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(GatewayCall::is_document_write));
    }

    #[test]
    fn test_unreachable_endpoint() {
        let gw = gateway();
        gw.set_unreachable(&Endpoint::new("es01", 9200));
        assert!(gw.ping().unwrap_err().is_connectivity());
    }
}
