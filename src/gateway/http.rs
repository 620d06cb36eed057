//! HTTP gateway over the cluster REST API

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::{GatewayError, GatewayResult};
use super::types::{
    ClusterHealth, ConnectionContext, DistributionState, Document, DocumentQuery, Endpoint,
    HealthColor, NodeStat, RestoreAck, RestoreOptions, SnapshotListing,
};
use super::ClusterGateway;
use crate::observability::Logger;

/// Upper bound on documents returned by one search
const SEARCH_PAGE_SIZE: u32 = 1000;

/// Restore refusal reason the cluster uses for a name clash
const OPEN_UNIT_EXISTS: &str = "an open index with same name already exists";

/// Blocking HTTP implementation of [`ClusterGateway`].
pub struct HttpGateway {
    context: ConnectionContext,
    agent: ureq::Agent,
    auth_header: Option<String>,
}

impl HttpGateway {
    pub fn new(context: ConnectionContext) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(context.timeout).build();
        let auth_header = context.credentials.as_ref().map(|c| {
            let token = STANDARD.encode(format!("{}:{}", c.username, c.password));
            format!("Basic {}", token)
        });
        Self {
            context,
            agent,
            auth_header,
        }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.context.endpoint.base_url(), path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, &self.url(path))
            .set("Content-Type", "application/json");
        if let Some(ref header) = self.auth_header {
            request = request.set("Authorization", header);
        }
        Logger::trace("GATEWAY_REQUEST", &[("method", method), ("path", path)]);
        request
    }

    fn call(&self, method: &str, path: &str, body: Option<&Value>) -> Result<ureq::Response, ureq::Error> {
        let request = self.request(method, path);
        match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
    }

    /// Issue a request and decode a JSON body, mapping every failure
    fn json<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<T> {
        let response = self.call(method, path, body).map_err(|e| self.map_error(e))?;
        response
            .into_json::<T>()
            .map_err(|e| GatewayError::Decode(format!("{} {}: {}", method, path, e)))
    }

    /// Like [`Self::json`] but a 404 is reported as `None`
    fn json_optional<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<Option<T>> {
        match self.call(method, path, body) {
            Ok(response) => response
                .into_json::<T>()
                .map(Some)
                .map_err(|e| GatewayError::Decode(format!("{} {}: {}", method, path, e))),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(self.map_error(e)),
        }
    }

    fn map_error(&self, error: ureq::Error) -> GatewayError {
        let endpoint = self.context.endpoint.to_string();
        match error {
            ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
                GatewayError::AuthFailed { endpoint }
            }
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                let reason = serde_json::from_str::<ErrorBody>(&body)
                    .map(|b| b.error.reason().to_string())
                    .unwrap_or(body);
                GatewayError::Http { status, reason }
            }
            ureq::Error::Transport(transport) => {
                let reason = transport.to_string();
                if reason.contains("timed out") {
                    GatewayError::Timeout(reason)
                } else {
                    GatewayError::Unreachable { endpoint, reason }
                }
            }
        }
    }
}

impl ClusterGateway for HttpGateway {
    fn endpoint(&self) -> &Endpoint {
        &self.context.endpoint
    }

    fn ping(&self) -> GatewayResult<bool> {
        match self.call("GET", "/", None) {
            Ok(response) => Ok(response.status() == 200),
            Err(ureq::Error::Status(_, _)) => Ok(false),
            Err(e) => Err(self.map_error(e)),
        }
    }

    fn list_snapshots(&self, repository: &str) -> GatewayResult<Vec<SnapshotListing>> {
        let rows: Vec<CatSnapshotRow> =
            self.json("GET", &format!("/_cat/snapshots/{}?format=json", repository), None)?;
        rows.into_iter()
            .map(|row| {
                let total_shards = row.total_shards.parse::<u32>().map_err(|_| {
                    GatewayError::Decode(format!(
                        "snapshot {} has non-numeric total_shards '{}'",
                        row.id, row.total_shards
                    ))
                })?;
                Ok(SnapshotListing {
                    id: row.id,
                    status: row.status,
                    total_shards,
                })
            })
            .collect()
    }

    fn snapshot_size(&self, repository: &str, snapshot_id: &str) -> GatewayResult<u64> {
        let status: SnapshotStatusBody = self.json(
            "GET",
            &format!("/_snapshot/{}/{}/_status", repository, snapshot_id),
            None,
        )?;
        status
            .snapshots
            .first()
            .map(|s| s.stats.total.size_in_bytes)
            .ok_or_else(|| GatewayError::NotFound(format!("snapshot status for {}", snapshot_id)))
    }

    fn live_units(&self) -> GatewayResult<Vec<String>> {
        let rows: Vec<CatIndexRow> = self.json("GET", "/_cat/indices?format=json&h=index", None)?;
        Ok(rows.into_iter().map(|r| r.index).collect())
    }

    fn cluster_health(&self) -> GatewayResult<ClusterHealth> {
        let body: HealthBody = self.json("GET", "/_cluster/health", None)?;
        body.into_health()
    }

    fn node_stats(&self) -> GatewayResult<Vec<NodeStat>> {
        let body: NodesStatsBody = self.json("GET", "/_nodes/stats/fs", None)?;
        Ok(body
            .nodes
            .into_values()
            .map(|node| NodeStat {
                hostname: node.name,
                roles: node.roles,
                total_bytes: node.fs.total.total_in_bytes,
                available_bytes: node.fs.total.available_in_bytes,
            })
            .collect())
    }

    fn shards_per_node(&self) -> GatewayResult<BTreeMap<String, u64>> {
        let rows: Vec<CatShardRow> = self.json("GET", "/_cat/shards?format=json&h=node,shard", None)?;
        let mut counts = BTreeMap::new();
        for node in rows.into_iter().filter_map(|r| r.node) {
            *counts.entry(node).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn restore_snapshot(
        &self,
        repository: &str,
        snapshot_id: &str,
        options: RestoreOptions,
    ) -> GatewayResult<RestoreAck> {
        let body = json!({
            "indices": "_all",
            "ignore_unavailable": options.ignore_unavailable,
            "include_global_state": options.include_global_state,
        });
        let path = format!("/_snapshot/{}/{}/_restore", repository, snapshot_id);
        match self.call("POST", &path, Some(&body)) {
            Ok(response) => {
                let ack: AcceptedBody = response
                    .into_json()
                    .map_err(|e| GatewayError::Decode(e.to_string()))?;
                Ok(RestoreAck { accepted: ack.accepted })
            }
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                let error = serde_json::from_str::<ErrorBody>(&text).ok();
                match error {
                    Some(ErrorBody { error: ErrorDetail::Structured { ref kind, ref reason } })
                        if kind == "snapshot_restore_exception" && reason.contains(OPEN_UNIT_EXISTS) =>
                    {
                        Err(GatewayError::UnitAlreadyExists {
                            unit: snapshot_id.to_string(),
                        })
                    }
                    Some(body) => Err(GatewayError::Http {
                        status,
                        reason: body.error.reason().to_string(),
                    }),
                    None => Err(GatewayError::Http { status, reason: text }),
                }
            }
            Err(e) => Err(self.map_error(e)),
        }
    }

    fn remove_lifecycle_policy(&self, unit: &str) -> GatewayResult<()> {
        let body: IlmRemoveBody = self.json("POST", &format!("/{}/_ilm/remove", unit), None)?;
        if body.has_failures {
            return Err(GatewayError::Rejected(format!(
                "lifecycle policy removal failed for {}",
                unit
            )));
        }
        Ok(())
    }

    fn set_replica_count(&self, unit: &str, count: u32) -> GatewayResult<()> {
        let body = json!({ "index": { "number_of_replicas": count } });
        let ack: AcknowledgedBody = self.json("PUT", &format!("/{}/_settings", unit), Some(&body))?;
        ack.require(unit)
    }

    fn set_visibility(&self, unit: &str, hidden: bool) -> GatewayResult<()> {
        let body = json!({ "index": { "hidden": hidden } });
        let ack: AcknowledgedBody = self.json("PUT", &format!("/{}/_settings", unit), Some(&body))?;
        ack.require(unit)
    }

    fn delete_unit(&self, unit: &str) -> GatewayResult<bool> {
        let ack: Option<AcknowledgedBody> = self.json_optional("DELETE", &format!("/{}", unit), None)?;
        Ok(ack.map(|a| a.acknowledged).unwrap_or(false))
    }

    fn unit_distribution_state(&self, unit: &str) -> GatewayResult<DistributionState> {
        let path = format!("/_cluster/health/{}?wait_for_status=green&timeout=10s", unit);
        let body: HealthBody = match self.call("GET", &path, None) {
            Ok(response) => response
                .into_json()
                .map_err(|e| GatewayError::Decode(e.to_string()))?,
            // The cluster answers 408 with a body when the wait itself times out
            Err(ureq::Error::Status(408, response)) => response
                .into_json()
                .map_err(|_| GatewayError::Timeout(format!("health of {}", unit)))?,
            Err(e) => return Err(self.map_error(e)),
        };
        HealthColor::parse(&body.status)
            .ok_or_else(|| GatewayError::Decode(format!("unknown health status '{}'", body.status)))
    }

    fn search_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<Vec<Document>> {
        let body = json!({ "query": query.to_query_json(), "size": SEARCH_PAGE_SIZE });
        let result: Option<SearchBody> =
            self.json_optional("POST", &format!("/{}/_search", index), Some(&body))?;
        Ok(result
            .map(|r| {
                r.hits
                    .hits
                    .into_iter()
                    .map(|hit| Document {
                        id: hit.id,
                        source: hit.source,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count_documents(&self, index: &str, query: &DocumentQuery) -> GatewayResult<u64> {
        let body = json!({ "query": query.to_query_json() });
        let result: Option<CountBody> =
            self.json_optional("POST", &format!("/{}/_count", index), Some(&body))?;
        Ok(result.map(|c| c.count).unwrap_or(0))
    }

    fn get_document(&self, index: &str, id: &str) -> GatewayResult<Option<Document>> {
        let result: Option<GetBody> = self.json_optional("GET", &format!("/{}/_doc/{}", index, id), None)?;
        Ok(result.and_then(|body| match (body.found, body.source) {
            (true, Some(source)) => Some(Document { id: body.id, source }),
            _ => None,
        }))
    }

    fn put_document(&self, index: &str, id: &str, source: &Value) -> GatewayResult<()> {
        let _: Value = self.json("PUT", &format!("/{}/_doc/{}?refresh=true", index, id), Some(source))?;
        Ok(())
    }

    fn append_document(&self, index: &str, source: &Value) -> GatewayResult<String> {
        let created: CreatedBody = self.json("POST", &format!("/{}/_doc", index), Some(source))?;
        Ok(created.id)
    }

    fn delete_document(&self, index: &str, id: &str) -> GatewayResult<bool> {
        let result: Option<Value> =
            self.json_optional("DELETE", &format!("/{}/_doc/{}?refresh=true", index, id), None)?;
        Ok(result.is_some())
    }
}

// -------------------------------------------------------------------------
// Wire shapes
// -------------------------------------------------------------------------

#[derive(Deserialize)]
struct CatSnapshotRow {
    id: String,
    status: String,
    total_shards: String,
}

#[derive(Deserialize)]
struct CatIndexRow {
    index: String,
}

#[derive(Deserialize)]
struct CatShardRow {
    node: Option<String>,
}

#[derive(Deserialize)]
struct SnapshotStatusBody {
    snapshots: Vec<SnapshotStatusEntry>,
}

#[derive(Deserialize)]
struct SnapshotStatusEntry {
    stats: SnapshotStats,
}

#[derive(Deserialize)]
struct SnapshotStats {
    total: SizeInBytes,
}

#[derive(Deserialize)]
struct SizeInBytes {
    size_in_bytes: u64,
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
    #[serde(default)]
    number_of_nodes: u32,
    #[serde(default)]
    number_of_data_nodes: u32,
    #[serde(default)]
    active_shards: u64,
    #[serde(default)]
    relocating_shards: u64,
    #[serde(default)]
    initializing_shards: u64,
    #[serde(default)]
    unassigned_shards: u64,
}

impl HealthBody {
    fn into_health(self) -> GatewayResult<ClusterHealth> {
        let status = HealthColor::parse(&self.status)
            .ok_or_else(|| GatewayError::Decode(format!("unknown health status '{}'", self.status)))?;
        Ok(ClusterHealth {
            status,
            number_of_nodes: self.number_of_nodes,
            number_of_data_nodes: self.number_of_data_nodes,
            active_shards: self.active_shards,
            relocating_shards: self.relocating_shards,
            initializing_shards: self.initializing_shards,
            unassigned_shards: self.unassigned_shards,
        })
    }
}

#[derive(Deserialize)]
struct NodesStatsBody {
    nodes: BTreeMap<String, NodeStatsEntry>,
}

#[derive(Deserialize)]
struct NodeStatsEntry {
    name: String,
    #[serde(default)]
    roles: Vec<String>,
    fs: NodeFs,
}

#[derive(Deserialize)]
struct NodeFs {
    total: NodeFsTotal,
}

#[derive(Deserialize)]
struct NodeFsTotal {
    total_in_bytes: u64,
    available_in_bytes: u64,
}

#[derive(Deserialize)]
struct AcceptedBody {
    #[serde(default)]
    accepted: bool,
}

#[derive(Deserialize)]
struct IlmRemoveBody {
    has_failures: bool,
}

#[derive(Deserialize)]
struct AcknowledgedBody {
    #[serde(default)]
    acknowledged: bool,
}

impl AcknowledgedBody {
    fn require(&self, unit: &str) -> GatewayResult<()> {
        if self.acknowledged {
            Ok(())
        } else {
            Err(GatewayError::Rejected(format!("settings update for {} not acknowledged", unit)))
        }
    }
}

#[derive(Deserialize)]
struct SearchBody {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: Value,
}

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
struct GetBody {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct CreatedBody {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        #[serde(rename = "type")]
        kind: String,
        reason: String,
    },
    Plain(String),
}

impl ErrorDetail {
    fn reason(&self) -> &str {
        match self {
            ErrorDetail::Structured { reason, .. } => reason,
            ErrorDetail::Plain(reason) => reason,
        }
    }
}
