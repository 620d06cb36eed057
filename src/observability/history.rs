//! Append-only restore history
//!
//! Every significant lifecycle step of a run (start, plan, confirmation,
//! batches, stage outcomes, end) is appended as one entry. The ledger is
//! write-only from the run's point of view; a failed append is logged and
//! never aborts the run.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Event, Logger};
use crate::gateway::{ClusterGateway, GatewayError};

/// Entry status as shown to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryStatus {
    Info,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Info => "INFO",
            HistoryStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub status: HistoryStatus,
    /// Short upper-snake action name, e.g. `RUN_START`
    pub action: String,
    pub message: String,
}

impl HistoryEntry {
    pub fn new(
        username: impl Into<String>,
        status: HistoryStatus,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            username: username.into(),
            status,
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn info(username: &str, action: &str, message: impl Into<String>) -> Self {
        Self::new(username, HistoryStatus::Info, action, message)
    }

    pub fn error(username: &str, action: &str, message: impl Into<String>) -> Self {
        Self::new(username, HistoryStatus::Error, action, message)
    }

    /// One JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Errors raised by a ledger sink
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file: {0}")]
    Io(#[from] io::Error),

    #[error("history encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("history index: {0}")]
    Cluster(#[from] GatewayError),
}

/// Append-only history sink.
pub trait HistoryLedger: Send + Sync {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;
}

/// Append and downgrade any failure to a warning
pub fn record(ledger: &dyn HistoryLedger, entry: HistoryEntry) {
    if let Err(err) = ledger.append(&entry) {
        let reason = err.to_string();
        Logger::event(
            Event::HistoryWriteFailed,
            &[("action", entry.action.as_str()), ("reason", reason.as_str())],
        );
    }
}

/// Indexes one document per entry into the history index.
pub struct ClusterHistoryLedger {
    gateway: Arc<dyn ClusterGateway>,
    index: String,
}

impl ClusterHistoryLedger {
    pub fn new(gateway: Arc<dyn ClusterGateway>, index: impl Into<String>) -> Self {
        Self {
            gateway,
            index: index.into(),
        }
    }
}

impl HistoryLedger for ClusterHistoryLedger {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let document = serde_json::to_value(entry)?;
        self.gateway.append_document(&self.index, &document)?;
        Ok(())
    }
}

/// JSON-lines file, flushed and synced on every append.
pub struct FileHistoryLedger {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileHistoryLedger {
    /// Open or create the ledger file in append mode
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryLedger for FileHistoryLedger {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let line = entry.to_json()?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Fans each entry out to several ledgers. Every sink is attempted; the
/// first failure is returned.
pub struct TeeHistoryLedger {
    sinks: Vec<Arc<dyn HistoryLedger>>,
}

impl TeeHistoryLedger {
    pub fn new(sinks: Vec<Arc<dyn HistoryLedger>>) -> Self {
        Self { sinks }
    }
}

impl HistoryLedger for TeeHistoryLedger {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.append(entry) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory ledger for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistoryLedger {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl MemoryHistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Actions in append order
    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryLedger for MemoryHistoryLedger {
    fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}
