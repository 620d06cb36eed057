//! Values exchanged with a cluster endpoint

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One host/port pair a cluster answers on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_ssl: false,
        }
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a gateway needs to talk to one endpoint.
///
/// Built once from configuration and handed to each component that needs
/// it; there is no process-wide connection state.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub endpoint: Endpoint,
    pub credentials: Option<Credentials>,
    pub repository: String,
    pub timeout: Duration,
}

/// Ordered tri-state used both for cluster health and per-unit distribution.
///
/// `Red < Yellow < Green`; `Green` is the best state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthColor {
    Red,
    Yellow,
    Green,
}

/// Per-unit allocation state as reported by the cluster
pub type DistributionState = HealthColor;

impl HealthColor {
    /// Top of the ordering
    pub const BEST: HealthColor = HealthColor::Green;

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "green" => Some(HealthColor::Green),
            "yellow" => Some(HealthColor::Yellow),
            "red" => Some(HealthColor::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthColor::Red => "red",
            HealthColor::Yellow => "yellow",
            HealthColor::Green => "green",
        }
    }

    pub fn is_best(&self) -> bool {
        *self == Self::BEST
    }
}

impl fmt::Display for HealthColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a repository snapshot listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotListing {
    pub id: String,
    pub status: String,
    pub total_shards: u32,
}

/// Cluster-wide health summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub status: HealthColor,
    pub number_of_nodes: u32,
    pub number_of_data_nodes: u32,
    pub active_shards: u64,
    pub relocating_shards: u64,
    pub initializing_shards: u64,
    pub unassigned_shards: u64,
}

/// Filesystem statistics of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    pub hostname: String,
    pub roles: Vec<String>,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Restore request flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOptions {
    pub ignore_unavailable: bool,
    pub include_global_state: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            ignore_unavailable: true,
            include_global_state: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreAck {
    pub accepted: bool,
}

/// A stored document and its id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source: serde_json::Value,
}

/// The small query vocabulary the state store and purge need
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentQuery {
    All,
    /// Exact match of a keyword field
    FieldEquals { field: String, value: String },
}

impl DocumentQuery {
    pub fn field_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        DocumentQuery::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a document source (used by in-memory backends)
    pub fn matches(&self, source: &serde_json::Value) -> bool {
        match self {
            DocumentQuery::All => true,
            DocumentQuery::FieldEquals { field, value } => {
                source.get(field).and_then(|v| v.as_str()) == Some(value.as_str())
            }
        }
    }

    /// Render as a search body
    pub fn to_query_json(&self) -> serde_json::Value {
        match self {
            DocumentQuery::All => serde_json::json!({ "match_all": {} }),
            DocumentQuery::FieldEquals { field, value } => serde_json::json!({
                "term": { format!("{}.keyword", field): value }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let plain = Endpoint::new("es01", 9200);
        assert_eq!(plain.base_url(), "http://es01:9200");
        assert_eq!(plain.to_string(), "es01:9200");
        assert_eq!(plain.with_ssl(true).base_url(), "https://es01:9200");
    }

    #[test]
    fn test_health_ordering() {
        assert!(HealthColor::Red < HealthColor::Yellow);
        assert!(HealthColor::Yellow < HealthColor::Green);
        assert!(HealthColor::Green.is_best());
        assert_eq!(HealthColor::parse("YELLOW"), Some(HealthColor::Yellow));
        assert_eq!(HealthColor::parse("blue"), None);
    }

    #[test]
    fn test_credentials_redacted() {
        let creds = Credentials {
            username: "ops".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_document_query() {
        let query = DocumentQuery::field_equals("status", "init");
        assert!(query.matches(&serde_json::json!({ "status": "init" })));
        assert!(!query.matches(&serde_json::json!({ "status": "restored" })));
        assert!(DocumentQuery::All.matches(&serde_json::json!({})));
        assert_eq!(
            query.to_query_json(),
            serde_json::json!({ "term": { "status.keyword": "init" } })
        );
    }
}
