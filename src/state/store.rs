//! Restore state store
//!
//! The single-flight guard is a count of `init` records taken before a run
//! starts. It is check-then-act: two operators that count zero at the same
//! moment can both proceed.

use std::sync::Arc;

use super::backend::RecordBackend;
use super::errors::StateResult;
use super::record::{RestoreRecord, RestoreStatus};

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    /// A cancelled record was put back to `init`
    Requeued,
    /// Record existed in this status and was left alone
    Unchanged(RestoreStatus),
}

/// Last known state of a unit, if it was ever queued
pub type RecordState = Option<RestoreStatus>;

pub struct RestoreStateStore {
    backend: Arc<dyn RecordBackend>,
    operator: String,
}

impl RestoreStateStore {
    /// `operator` is written as `requested_by` on records this store creates
    pub fn new(backend: Arc<dyn RecordBackend>, operator: impl Into<String>) -> Self {
        Self {
            backend,
            operator: operator.into(),
        }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Number of records in `init`
    pub fn count_init_records(&self) -> StateResult<u64> {
        self.backend.count(RestoreStatus::Init)
    }

    /// `init` records that block a new run.
    ///
    /// With `resume`, this operator's own `init` records are adopted and do
    /// not block.
    pub fn count_blocking(&self, resume: bool) -> StateResult<u64> {
        if !resume {
            return self.count_init_records();
        }
        Ok(self
            .backend
            .search(Some(RestoreStatus::Init))?
            .iter()
            .filter(|r| r.requested_by != self.operator)
            .count() as u64)
    }

    /// Units this operator left in `init`
    pub fn owned_init_units(&self) -> StateResult<Vec<String>> {
        let mut units: Vec<String> = self
            .backend
            .search(Some(RestoreStatus::Init))?
            .into_iter()
            .filter(|r| r.requested_by == self.operator)
            .map(|r| r.unit_name)
            .collect();
        units.sort();
        Ok(units)
    }

    /// Create in `status` when absent; a cancelled record returns to `init`;
    /// anything else is left for explicit transitions.
    pub fn upsert(&self, unit_name: &str, status: RestoreStatus) -> StateResult<UpsertOutcome> {
        match self.backend.get(unit_name)? {
            None => {
                self.backend
                    .put(&RestoreRecord::new(unit_name, self.operator.as_str(), status))?;
                Ok(UpsertOutcome::Created)
            }
            Some(record) if record.status == RestoreStatus::Cancelled => {
                let mut record = record.with_status(RestoreStatus::Init);
                record.requested_by = self.operator.clone();
                self.backend.put(&record)?;
                Ok(UpsertOutcome::Requeued)
            }
            Some(record) => Ok(UpsertOutcome::Unchanged(record.status)),
        }
    }

    /// Unconditional status and timestamp update. A missing record is
    /// created in `status`.
    pub fn transition(&self, unit_name: &str, status: RestoreStatus) -> StateResult<()> {
        let record = match self.backend.get(unit_name)? {
            Some(record) => record.with_status(status),
            None => RestoreRecord::new(unit_name, self.operator.as_str(), status),
        };
        self.backend.put(&record)
    }

    /// The unit is live. The record is rewritten whole, so `restore_date`
    /// and retention age count from this restore.
    pub fn mark_restored(&self, unit_name: &str) -> StateResult<()> {
        let record = match self.backend.get(unit_name)? {
            Some(record) => record.restamped(self.operator.as_str(), RestoreStatus::Restored),
            None => RestoreRecord::new(unit_name, self.operator.as_str(), RestoreStatus::Restored),
        };
        self.backend.put(&record)
    }

    /// Whether the unit was ever queued, and its last status
    pub fn exists(&self, unit_name: &str) -> StateResult<(bool, RecordState)> {
        let state = self.backend.get(unit_name)?.map(|r| r.status);
        Ok((state.is_some(), state))
    }

    pub fn get(&self, unit_name: &str) -> StateResult<Option<RestoreRecord>> {
        self.backend.get(unit_name)
    }

    /// Records ordered by unit name
    pub fn list(&self, status: Option<RestoreStatus>) -> StateResult<Vec<RestoreRecord>> {
        let mut records = self.backend.search(status)?;
        records.sort_by(|a, b| a.unit_name.cmp(&b.unit_name));
        Ok(records)
    }

    pub fn delete(&self, unit_name: &str) -> StateResult<bool> {
        self.backend.delete(unit_name)
    }

    /// Release the guard: every `init` record goes to `cancelled`.
    /// Returns the released unit names.
    pub fn cancel_all_init(&self) -> StateResult<Vec<String>> {
        let pending = self.list(Some(RestoreStatus::Init))?;
        let mut released = Vec::with_capacity(pending.len());
        for record in pending {
            let name = record.unit_name.clone();
            self.backend.put(&record.with_status(RestoreStatus::Cancelled))?;
            released.push(name);
        }
        Ok(released)
    }
}
