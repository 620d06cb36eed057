//! Run request and result

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::capacity::{AdmissionReport, RestorePlan};

/// What to restore and how
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Unanchored regular expression over snapshot ids
    pub pattern: String,
    /// `YYYY.MM.DD`
    pub target_date: String,
    /// Location names; empty means every configured location
    pub locations: Vec<String>,
    /// Overrides the configured batch size
    pub batch_size: Option<usize>,
    /// Overrides the configured per-node shard limit
    pub max_shards_per_node: Option<u64>,
    pub wait_for_stable: bool,
    pub dry_run: bool,
    /// Skip the interactive confirmation
    pub assume_yes: bool,
    /// Adopt this operator's own `init` records instead of aborting
    pub resume: bool,
    /// Ceiling on each stability wait
    pub max_wait: Option<Duration>,
}

impl RunRequest {
    pub fn new(pattern: impl Into<String>, target_date: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target_date: target_date.into(),
            locations: Vec::new(),
            batch_size: None,
            max_shards_per_node: None,
            wait_for_stable: false,
            dry_run: false,
            assume_yes: false,
            resume: false,
            max_wait: None,
        }
    }

    pub fn with_locations(mut self, locations: &[&str]) -> Self {
        self.locations = locations.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn assume_yes(mut self) -> Self {
        self.assume_yes = true;
        self
    }

    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }

    pub fn wait_for_stable(mut self, max_wait: Option<Duration>) -> Self {
        self.wait_for_stable = true;
        self.max_wait = max_wait;
        self
    }
}

/// Activation pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Restore,
    RemoveLifecyclePolicy,
    DropReplicas,
    Unhide,
    RecordRestored,
}

impl PipelineStage {
    pub const ORDER: [PipelineStage; 5] = [
        PipelineStage::Restore,
        PipelineStage::RemoveLifecyclePolicy,
        PipelineStage::DropReplicas,
        PipelineStage::Unhide,
        PipelineStage::RecordRestored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Restore => "restore",
            PipelineStage::RemoveLifecyclePolicy => "remove_lifecycle_policy",
            PipelineStage::DropReplicas => "drop_replicas",
            PipelineStage::Unhide => "unhide",
            PipelineStage::RecordRestored => "record_restored",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit skipped because an open unit of the same name exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitConflict {
    pub unit: String,
    pub location: String,
    pub reason: String,
}

/// A unit whose pipeline halted; earlier stages are not rolled back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub location: String,
    pub stage: PipelineStage,
    pub reason: String,
}

/// Admission outcome for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationAdmission {
    pub location: String,
    pub report: AdmissionReport,
    pub plan: RestorePlan,
}

/// Outcome of a run that did not end in an error
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub admitted_count: usize,
    pub rejected_count: usize,
    pub restored_units: Vec<String>,
    pub conflicts: Vec<UnitConflict>,
    pub failures: Vec<UnitFailure>,
    /// Already live in the cluster, not touched
    pub skipped_active: Vec<String>,
    /// Restored by an earlier run
    pub skipped_restored: Vec<String>,
    /// Live units adopted from an interrupted run and finished
    pub resumed_units: Vec<String>,
    pub batches: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub dry_run: bool,
    /// Time spent waiting for stability, per batch
    #[serde(with = "duration_ms_vec")]
    pub stability_waits: Vec<Duration>,
    pub admission: Vec<LocationAdmission>,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

mod duration_ms_vec {
    use serde::ser::SerializeSeq;
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(values: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&(value.as_millis() as u64))?;
        }
        seq.end()
    }
}
