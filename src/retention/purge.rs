//! Age-based purge of restored units

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::{ClusterGateway, GatewayError};
use crate::observability::history::record;
use crate::observability::{Event, HistoryEntry, HistoryLedger, Logger};
use crate::state::{RestoreRecord, RestoreStateStore, StateError};

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to delete unit {unit}: {source}")]
    Cluster {
        unit: String,
        #[source]
        source: GatewayError,
    },
}

/// What a purge removed or would remove
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub max_days: u32,
    pub dry_run: bool,
    /// Units deleted from at least one cluster
    pub deleted_units: Vec<String>,
    pub removed_records: Vec<String>,
    pub kept_units: Vec<String>,
}

pub struct RetentionPurger<'a> {
    store: &'a RestoreStateStore,
    gateways: Vec<Arc<dyn ClusterGateway>>,
    history: &'a dyn HistoryLedger,
}

impl<'a> RetentionPurger<'a> {
    /// `gateways` holds one gateway per location to delete from
    pub fn new(
        store: &'a RestoreStateStore,
        gateways: Vec<Arc<dyn ClusterGateway>>,
        history: &'a dyn HistoryLedger,
    ) -> Self {
        Self {
            store,
            gateways,
            history,
        }
    }

    pub fn purge(&self, max_days: u32, dry_run: bool) -> Result<PurgeReport, PurgeError> {
        self.purge_at(Utc::now(), max_days, dry_run)
    }

    /// Purge every record whose restore date is at least `max_days` before `now`
    pub fn purge_at(&self, now: DateTime<Utc>, max_days: u32, dry_run: bool) -> Result<PurgeReport, PurgeError> {
        let cutoff = now - Duration::days(i64::from(max_days));
        let mut report = PurgeReport {
            max_days,
            dry_run,
            ..PurgeReport::default()
        };

        for entry in self.store.list(None)? {
            if entry.created_at > cutoff {
                Logger::event(
                    Event::PurgeKept,
                    &[
                        ("unit", entry.unit_name.as_str()),
                        ("restore_date", &entry.created_at.to_rfc3339()),
                    ],
                );
                report.kept_units.push(entry.unit_name);
                continue;
            }

            if dry_run {
                report.deleted_units.push(entry.unit_name.clone());
                report.removed_records.push(entry.unit_name);
                continue;
            }

            if self.delete_everywhere(&entry)? {
                report.deleted_units.push(entry.unit_name.clone());
            }
            self.store.delete(&entry.unit_name)?;
            Logger::event(
                Event::PurgeDeleted,
                &[
                    ("unit", entry.unit_name.as_str()),
                    ("restore_date", &entry.created_at.to_rfc3339()),
                ],
            );
            record(
                self.history,
                HistoryEntry::info(self.store.operator(), "PURGE", entry.unit_name.as_str()),
            );
            report.removed_records.push(entry.unit_name);
        }

        Ok(report)
    }

    /// True when the unit existed in any location
    fn delete_everywhere(&self, entry: &RestoreRecord) -> Result<bool, PurgeError> {
        let mut deleted = false;
        for gateway in &self.gateways {
            deleted |= gateway
                .delete_unit(&entry.unit_name)
                .map_err(|source| PurgeError::Cluster {
                    unit: entry.unit_name.clone(),
                    source,
                })?;
        }
        Ok(deleted)
    }
}
