//! Shared fixture for the orchestrator integration tests
//!
//! One location `dc1` backed by a single in-memory cluster with two data
//! nodes, records in a memory backend and history in a memory ledger.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use restorectl::gateway::{ClusterGateway, Endpoint, MemoryGateway};
use restorectl::observability::MemoryHistoryLedger;
use restorectl::orchestrator::{
    Decision, FixedConfirmer, Location, OrchestratorSettings, RestoreOrchestrator, Topology,
};
use restorectl::state::{MemoryRecordBackend, RecordBackend, RestoreRecord, RestoreStateStore, RestoreStatus};

pub const OPERATOR: &str = "ops";
pub const REPOSITORY: &str = "backups";

pub struct Harness {
    pub gw: MemoryGateway,
    pub backend: MemoryRecordBackend,
    pub history: MemoryHistoryLedger,
    pub settings: OrchestratorSettings,
}

impl Harness {
    /// Two roomy data nodes and a green cluster
    pub fn new() -> Self {
        let harness = Self::bare();
        harness.gw.add_node("node-1", &["data_hot"], 1_000_000, 1_000_000, 10);
        harness.gw.add_node("node-2", &["data_hot"], 1_000_000, 1_000_000, 10);
        harness
    }

    /// No nodes; tests add their own
    pub fn bare() -> Self {
        Self {
            gw: MemoryGateway::new(Endpoint::new("es01", 9200)),
            backend: MemoryRecordBackend::new(),
            history: MemoryHistoryLedger::new(),
            settings: OrchestratorSettings {
                safety_margin: 0.0,
                poll_interval: Duration::from_millis(1),
                ..OrchestratorSettings::default()
            },
        }
    }

    /// Publish `snapshot_<series>-<date>` restoring unit `<series>-<date>`
    pub fn snapshot(&self, series: &str, date: &str, shards: u32, size: u64) -> String {
        let unit = format!("{}-{}", series, date);
        self.gw
            .add_snapshot(&format!("snapshot_{}", unit), &unit, shards, size);
        unit
    }

    pub fn store(&self) -> RestoreStateStore {
        RestoreStateStore::new(Arc::new(self.backend.clone()), OPERATOR)
    }

    pub fn topology(&self) -> Topology {
        Topology::new().with_location(Location::new(
            "dc1",
            REPOSITORY,
            vec![Arc::new(self.gw.clone()) as Arc<dyn ClusterGateway>],
        ))
    }

    pub fn orchestrator(&self) -> RestoreOrchestrator {
        self.orchestrator_with(Arc::new(FixedConfirmer::accept()))
    }

    pub fn orchestrator_with(&self, confirmer: Arc<FixedConfirmer>) -> RestoreOrchestrator {
        self.orchestrator_for(self.topology(), confirmer)
    }

    pub fn orchestrator_for(&self, topology: Topology, confirmer: Arc<FixedConfirmer>) -> RestoreOrchestrator {
        RestoreOrchestrator::new(
            topology,
            self.store(),
            Arc::new(self.history.clone()),
            confirmer,
            self.settings.clone(),
        )
    }

    /// Seed a record as if another run had written it
    pub fn seed_record(&self, unit: &str, requested_by: &str, status: RestoreStatus) {
        self.backend
            .put(&RestoreRecord::new(unit, requested_by, status))
            .unwrap();
    }

    pub fn status_of(&self, unit: &str) -> Option<RestoreStatus> {
        self.store().get(unit).unwrap().map(|r| r.status)
    }

    pub fn mutating_ops(&self) -> Vec<&'static str> {
        self.gw.mutating_calls().iter().map(|c| c.op).collect()
    }
}

pub fn decline() -> Arc<FixedConfirmer> {
    Arc::new(FixedConfirmer::new(Decision::Decline))
}
