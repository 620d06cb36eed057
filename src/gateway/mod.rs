//! Cluster gateway
//!
//! Thin transport boundary over one cluster endpoint. Everything above this
//! module talks to the cluster only through [`ClusterGateway`], which keeps
//! the orchestrator testable against [`MemoryGateway`].
//!
//! All calls are blocking round trips. Gateways are shared as
//! `Arc<dyn ClusterGateway>`.

mod errors;
mod http;
mod memory;
mod types;

pub use errors::{GatewayError, GatewayResult};
pub use http::HttpGateway;
pub use memory::{GatewayCall, MemoryGateway};
pub use types::{
    ClusterHealth, ConnectionContext, Credentials, DistributionState, Document, DocumentQuery,
    Endpoint, HealthColor, NodeStat, RestoreAck, RestoreOptions, SnapshotListing,
};

use std::collections::BTreeMap;

/// Operations the restore tooling needs from one cluster endpoint.
pub trait ClusterGateway: Send + Sync {
    /// The endpoint this gateway talks to
    fn endpoint(&self) -> &Endpoint;

    /// `Ok(false)` when the endpoint answers but is not serving
    fn ping(&self) -> GatewayResult<bool>;

    // ---------------------------------------------------------------------
    // Discovery
    // ---------------------------------------------------------------------

    fn list_snapshots(&self, repository: &str) -> GatewayResult<Vec<SnapshotListing>>;

    /// Total stored size of a snapshot in bytes
    fn snapshot_size(&self, repository: &str, snapshot_id: &str) -> GatewayResult<u64>;

    /// Names of every unit currently present in the cluster
    fn live_units(&self) -> GatewayResult<Vec<String>>;

    fn cluster_health(&self) -> GatewayResult<ClusterHealth>;

    fn node_stats(&self) -> GatewayResult<Vec<NodeStat>>;

    /// Assigned shard copies keyed by node name. Unassigned shards are not counted.
    fn shards_per_node(&self) -> GatewayResult<BTreeMap<String, u64>>;

    // ---------------------------------------------------------------------
    // Activation pipeline (mutating)
    // ---------------------------------------------------------------------

    /// Fails with [`GatewayError::UnitAlreadyExists`] when an open unit of
    /// the same name blocks the restore.
    fn restore_snapshot(
        &self,
        repository: &str,
        snapshot_id: &str,
        options: RestoreOptions,
    ) -> GatewayResult<RestoreAck>;

    fn remove_lifecycle_policy(&self, unit: &str) -> GatewayResult<()>;

    fn set_replica_count(&self, unit: &str, count: u32) -> GatewayResult<()>;

    fn set_visibility(&self, unit: &str, hidden: bool) -> GatewayResult<()>;

    /// Returns `Ok(false)` when the unit did not exist
    fn delete_unit(&self, unit: &str) -> GatewayResult<bool>;

    // ---------------------------------------------------------------------
    // Stability
    // ---------------------------------------------------------------------

    fn unit_distribution_state(&self, unit: &str) -> GatewayResult<DistributionState>;

    // ---------------------------------------------------------------------
    // Documents (restore records and history)
    // ---------------------------------------------------------------------

    /// Missing index yields an empty result, not an error
    fn search_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<Vec<Document>>;

    fn count_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<u64>;

    fn get_document(&self, index: &str, id: &str) -> GatewayResult<Option<Document>>;

    /// Create or replace the document with the given id
    fn put_document(&self, index: &str, id: &str, source: &serde_json::Value) -> GatewayResult<()>;

    /// Index a document under a cluster-assigned id and return that id
    fn append_document(&self, index: &str, source: &serde_json::Value) -> GatewayResult<String>;

    /// Returns `Ok(false)` when there was nothing to delete
    fn delete_document(&self, index: &str, id: &str) -> GatewayResult<bool>;
}
