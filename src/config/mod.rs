//! Runtime configuration
//!
//! A single JSON file (default `./restorectl.json`) names every cluster
//! location and the tunables of a restore run. Location names are matched
//! case-insensitively; they are lowercased on load.

mod errors;

pub use errors::{ConfigError, ConfigErrorCode, ConfigResult};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::{ConnectionContext, Credentials, Endpoint};

/// Default config path, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "restorectl.json";

/// One cluster location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub hostname: String,

    /// Every port is an endpoint of the same logical cluster
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    #[serde(default)]
    pub use_ssl: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Overrides the top-level repository for this location
    #[serde(default)]
    pub repository: Option<String>,
}

impl LocationConfig {
    /// Basic-auth credentials, only when both halves are present
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub locations: BTreeMap<String, LocationConfig>,

    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Index holding one restore record per unit
    #[serde(default = "default_restored_index")]
    pub restored_index: String,

    #[serde(default = "default_history_index")]
    pub history_index: String,

    #[serde(default = "default_max_shards_per_node")]
    pub max_shards_per_node: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fraction of each node's total bytes never planned into
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,

    #[serde(default = "default_data_roles")]
    pub data_roles: Vec<String>,

    #[serde(default = "default_true")]
    pub require_green: bool,

    /// Age limit for the purge command
    #[serde(default)]
    pub restored_max_days: Option<u32>,

    /// Extra JSON-lines copy of the history ledger
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_ports() -> Vec<u16> {
    vec![9200]
}
fn default_repository() -> String {
    "default-repo".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_restored_index() -> String {
    "rc_snapshots".to_string()
}
fn default_history_index() -> String {
    "rc_snapshots_history".to_string()
}
fn default_max_shards_per_node() -> u64 {
    1000
}
fn default_batch_size() -> usize {
    3
}
fn default_safety_margin() -> f64 {
    0.20
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_snapshot_prefix() -> String {
    "snapshot_".to_string()
}
fn default_data_roles() -> Vec<String> {
    vec![
        "data_content".to_string(),
        "data_hot".to_string(),
        "data_warm".to_string(),
    ]
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load, normalize and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        Self::from_json(&content)
    }

    /// Parse, normalize and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(content).map_err(ConfigError::parse)?;
        let config = config.normalized()?;
        config.validate()?;
        Ok(config)
    }

    /// Lowercase location names, rejecting names that collide once folded
    fn normalized(mut self) -> ConfigResult<Self> {
        let mut locations = BTreeMap::new();
        for (name, location) in std::mem::take(&mut self.locations) {
            let key = name.trim().to_lowercase();
            if locations.insert(key.clone(), location).is_some() {
                return Err(ConfigError::invalid(format!(
                    "location '{}' is defined more than once",
                    key
                )));
            }
        }
        self.locations = locations;
        Ok(self)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.locations.is_empty() {
            return Err(ConfigError::invalid("at least one location is required"));
        }

        for (name, location) in &self.locations {
            if name.is_empty() {
                return Err(ConfigError::invalid("location names must not be empty"));
            }
            if location.hostname.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "location '{}' has no hostname",
                    name
                )));
            }
            if location.ports.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "location '{}' has no ports",
                    name
                )));
            }
        }

        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be > 0"));
        }

        if self.max_shards_per_node == 0 {
            return Err(ConfigError::invalid("max_shards_per_node must be > 0"));
        }

        if !(0.0..1.0).contains(&self.safety_margin) {
            return Err(ConfigError::invalid(format!(
                "safety_margin must be in [0.0, 1.0), got {}",
                self.safety_margin
            )));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("poll_interval_secs must be > 0"));
        }

        if self.repository.trim().is_empty() {
            return Err(ConfigError::invalid("repository must not be empty"));
        }

        Ok(())
    }

    /// Case-insensitive location lookup
    pub fn location(&self, name: &str) -> Option<&LocationConfig> {
        self.locations.get(&name.trim().to_lowercase())
    }

    pub fn location_names(&self) -> Vec<String> {
        self.locations.keys().cloned().collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Repository used for a location
    pub fn repository_for(&self, location: &LocationConfig) -> String {
        location
            .repository
            .clone()
            .unwrap_or_else(|| self.repository.clone())
    }

    /// One connection context per configured port of `name`, in port order
    pub fn contexts(&self, name: &str) -> Option<Vec<ConnectionContext>> {
        let location = self.location(name)?;
        let repository = self.repository_for(location);
        let credentials = location.credentials();

        Some(
            location
                .ports
                .iter()
                .map(|port| ConnectionContext {
                    endpoint: Endpoint::new(location.hostname.clone(), *port)
                        .with_ssl(location.use_ssl),
                    credentials: credentials.clone(),
                    repository: repository.clone(),
                    timeout: self.timeout(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{ "locations": { "DC1": { "hostname": "es-dc1" } } }"#;

    #[test]
    fn test_defaults_filled() {
        let config = Config::from_json(MINIMAL).unwrap();

        assert_eq!(config.repository, "default-repo");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.restored_index, "rc_snapshots");
        assert_eq!(config.history_index, "rc_snapshots_history");
        assert_eq!(config.max_shards_per_node, 1000);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.snapshot_prefix, "snapshot_");
        assert_eq!(config.data_roles.len(), 3);
        assert!(config.require_green);
        assert!(config.restored_max_days.is_none());
        assert_eq!(config.location("dc1").unwrap().ports, vec![9200]);
    }

    #[test]
    fn test_location_lookup_is_case_insensitive() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert!(config.location("Dc1").is_some());
        assert!(config.location("dc2").is_none());
        assert_eq!(config.location_names(), vec!["dc1".to_string()]);
    }

    #[test]
    fn test_colliding_location_names_rejected() {
        let json = r#"{ "locations": {
            "dc1": { "hostname": "a" },
            "DC1": { "hostname": "b" }
        } }"#;
        let err = Config::from_json(json).unwrap_err();
        assert_eq!(err.code(), ConfigErrorCode::RestoreConfigInvalid);
    }

    #[test]
    fn test_validation_rules() {
        let cases = [
            r#"{ "locations": {} }"#,
            r#"{ "locations": { "a": { "hostname": "" } } }"#,
            r#"{ "locations": { "a": { "hostname": "h", "ports": [] } } }"#,
            r#"{ "locations": { "a": { "hostname": "h" } }, "batch_size": 0 }"#,
            r#"{ "locations": { "a": { "hostname": "h" } }, "max_shards_per_node": 0 }"#,
            r#"{ "locations": { "a": { "hostname": "h" } }, "safety_margin": 1.0 }"#,
            r#"{ "locations": { "a": { "hostname": "h" } }, "safety_margin": -0.1 }"#,
            r#"{ "locations": { "a": { "hostname": "h" } }, "poll_interval_secs": 0 }"#,
        ];
        for case in cases {
            let err = Config::from_json(case).unwrap_err();
            assert_eq!(err.code(), ConfigErrorCode::RestoreConfigInvalid, "{}", case);
        }
    }

    #[test]
    fn test_contexts_per_port() {
        let json = r#"{
            "repository": "s3-backups",
            "locations": {
                "dc1": {
                    "hostname": "es-dc1",
                    "ports": [9200, 9201],
                    "use_ssl": true,
                    "username": "elastic",
                    "password": "changeme"
                },
                "dc2": { "hostname": "es-dc2", "repository": "dc2-repo" }
            }
        }"#;
        let config = Config::from_json(json).unwrap();

        let contexts = config.contexts("DC1").unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[1].endpoint.base_url(), "https://es-dc1:9201");
        assert_eq!(contexts[0].repository, "s3-backups");
        assert!(contexts[0].credentials.is_some());
        assert_eq!(contexts[0].timeout, Duration::from_secs(60));

        let dc2 = config.contexts("dc2").unwrap();
        assert_eq!(dc2[0].repository, "dc2-repo");
        assert!(dc2[0].credentials.is_none());
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let location = LocationConfig {
            hostname: "h".into(),
            ports: vec![9200],
            use_ssl: false,
            username: Some("elastic".into()),
            password: None,
            repository: None,
        };
        assert!(location.credentials().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.locations.len(), 1);

        let missing = Config::load(Path::new("/nonexistent/restorectl.json")).unwrap_err();
        assert_eq!(missing.code(), ConfigErrorCode::RestoreConfigRead);
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_json("not json").unwrap_err();
        assert_eq!(err.code(), ConfigErrorCode::RestoreConfigParse);
    }
}
