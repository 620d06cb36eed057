//! Restore records
//!
//! One document per unit ever queued, keyed by unit name. Field names match
//! the documents already present in existing record indices.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a queued unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStatus {
    Init,
    Restored,
    Cancelled,
}

impl RestoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Init => "init",
            RestoreStatus::Restored => "restored",
            RestoreStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "init" => Some(RestoreStatus::Init),
            "restored" => Some(RestoreStatus::Restored),
            "cancelled" => Some(RestoreStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRecord {
    #[serde(rename = "index_name")]
    pub unit_name: String,
    #[serde(rename = "osuser")]
    pub requested_by: String,
    #[serde(rename = "restore_date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "last_updated")]
    pub updated_at: DateTime<Utc>,
    pub status: RestoreStatus,
}

impl RestoreRecord {
    pub fn new(unit_name: impl Into<String>, requested_by: impl Into<String>, status: RestoreStatus) -> Self {
        let now = Utc::now();
        Self {
            unit_name: unit_name.into(),
            requested_by: requested_by.into(),
            created_at: now,
            updated_at: now,
            status,
        }
    }

    /// Same record with a new status and a fresh `updated_at`
    pub fn with_status(mut self, status: RestoreStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    /// Same record written afresh: new status, new owner, both timestamps
    /// reset to now
    pub fn restamped(mut self, requested_by: impl Into<String>, status: RestoreStatus) -> Self {
        let now = Utc::now();
        self.requested_by = requested_by.into();
        self.status = status;
        self.created_at = now;
        self.updated_at = now;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_field_names() {
        let record = RestoreRecord::new("logs-app-2024.01.01", "ops", RestoreStatus::Init);
        let doc = serde_json::to_value(&record).unwrap();

        assert_eq!(doc["index_name"], "logs-app-2024.01.01");
        assert_eq!(doc["osuser"], "ops");
        assert_eq!(doc["status"], "init");
        assert!(doc.get("restore_date").is_some());
        assert!(doc.get("last_updated").is_some());
    }

    #[test]
    fn test_reads_microsecond_timestamps() {
        let doc = serde_json::json!({
            "index_name": "logs-app",
            "osuser": "ops",
            "restore_date": "2024-01-05T10:11:12.123456Z",
            "last_updated": "2024-01-05T10:15:00.000001Z",
            "status": "restored"
        });
        let record: RestoreRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.status, RestoreStatus::Restored);
        assert!(record.updated_at > record.created_at);
    }

    #[test]
    fn test_with_status_touches_updated_at_only() {
        let record = RestoreRecord::new("u", "ops", RestoreStatus::Init);
        let created = record.created_at;
        let next = record.with_status(RestoreStatus::Cancelled);

        assert_eq!(next.status, RestoreStatus::Cancelled);
        assert_eq!(next.created_at, created);
        assert!(next.updated_at >= created);
    }

    #[test]
    fn test_restamped_resets_restore_date() {
        let mut record = RestoreRecord::new("u", "alice", RestoreStatus::Cancelled);
        record.created_at -= chrono::Duration::days(30);
        let old = record.created_at;

        let next = record.restamped("ops", RestoreStatus::Restored);

        assert_eq!(next.status, RestoreStatus::Restored);
        assert_eq!(next.requested_by, "ops");
        assert!(next.created_at > old);
        assert_eq!(next.created_at, next.updated_at);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(RestoreStatus::parse("cancelled"), Some(RestoreStatus::Cancelled));
        assert_eq!(RestoreStatus::parse("INIT"), None);
    }
}
