//! Storage behind the restore state store

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::errors::{StateError, StateResult};
use super::record::{RestoreRecord, RestoreStatus};
use crate::gateway::{ClusterGateway, DocumentQuery};

/// Document collection holding restore records, keyed by unit name.
pub trait RecordBackend: Send + Sync {
    /// Records, optionally only those in `status`
    fn search(&self, status: Option<RestoreStatus>) -> StateResult<Vec<RestoreRecord>>;

    fn count(&self, status: RestoreStatus) -> StateResult<u64>;

    fn get(&self, unit_name: &str) -> StateResult<Option<RestoreRecord>>;

    /// Create or replace
    fn put(&self, record: &RestoreRecord) -> StateResult<()>;

    fn delete(&self, unit_name: &str) -> StateResult<bool>;
}

fn status_query(status: Option<RestoreStatus>) -> DocumentQuery {
    match status {
        Some(status) => DocumentQuery::field_equals("status", status.as_str()),
        None => DocumentQuery::All,
    }
}

/// Records stored as documents in a cluster index
pub struct IndexRecordBackend {
    gateway: Arc<dyn ClusterGateway>,
    index: String,
}

impl IndexRecordBackend {
    pub fn new(gateway: Arc<dyn ClusterGateway>, index: impl Into<String>) -> Self {
        Self {
            gateway,
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn decode(&self, source: serde_json::Value) -> StateResult<RestoreRecord> {
        serde_json::from_value(source)
            .map_err(|e| StateError::corrupt(format!("record in {}", self.index), e))
    }
}

impl RecordBackend for IndexRecordBackend {
    fn search(&self, status: Option<RestoreStatus>) -> StateResult<Vec<RestoreRecord>> {
        let documents = self
            .gateway
            .search_documents(&self.index, &status_query(status))
            .map_err(|e| StateError::store(format!("search {}", self.index), e))?;

        documents
            .into_iter()
            .map(|doc| self.decode(doc.source))
            .collect()
    }

    fn count(&self, status: RestoreStatus) -> StateResult<u64> {
        self.gateway
            .count_documents(&self.index, &status_query(Some(status)))
            .map_err(|e| StateError::store(format!("count {} records", status), e))
    }

    fn get(&self, unit_name: &str) -> StateResult<Option<RestoreRecord>> {
        let document = self
            .gateway
            .get_document(&self.index, unit_name)
            .map_err(|e| StateError::store(format!("get record {}", unit_name), e))?;

        document.map(|doc| self.decode(doc.source)).transpose()
    }

    fn put(&self, record: &RestoreRecord) -> StateResult<()> {
        let source = serde_json::to_value(record)
            .map_err(|e| StateError::corrupt(format!("encode record {}", record.unit_name), e))?;

        self.gateway
            .put_document(&self.index, &record.unit_name, &source)
            .map_err(|e| StateError::store(format!("write record {}", record.unit_name), e))
    }

    fn delete(&self, unit_name: &str) -> StateResult<bool> {
        self.gateway
            .delete_document(&self.index, unit_name)
            .map_err(|e| StateError::store(format!("delete record {}", unit_name), e))
    }
}

/// In-process records for tests. Can be switched offline to exercise the
/// fatal-store paths.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordBackend {
    records: Arc<Mutex<BTreeMap<String, RestoreRecord>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of every stored record
    pub fn records(&self) -> Vec<RestoreRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, RestoreRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn online(&self) -> StateResult<MutexGuard<'_, BTreeMap<String, RestoreRecord>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StateError::unavailable("record backend offline"));
        }
        Ok(self.lock())
    }
}

impl RecordBackend for MemoryRecordBackend {
    fn search(&self, status: Option<RestoreStatus>) -> StateResult<Vec<RestoreRecord>> {
        Ok(self
            .online()?
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    fn count(&self, status: RestoreStatus) -> StateResult<u64> {
        Ok(self.online()?.values().filter(|r| r.status == status).count() as u64)
    }

    fn get(&self, unit_name: &str) -> StateResult<Option<RestoreRecord>> {
        Ok(self.online()?.get(unit_name).cloned())
    }

    fn put(&self, record: &RestoreRecord) -> StateResult<()> {
        self.online()?
            .insert(record.unit_name.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, unit_name: &str) -> StateResult<bool> {
        Ok(self.online()?.remove(unit_name).is_some())
    }
}
