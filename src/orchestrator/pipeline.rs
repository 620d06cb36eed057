//! Per-unit activation pipeline
//!
//! Stages run in a fixed order and are not transactional: a failure halts
//! the unit where it is and nothing already done is undone.

use crate::catalog::RestorableUnit;
use crate::gateway::{ClusterGateway, GatewayError, RestoreOptions};
use crate::observability::history::record;
use crate::observability::{Event, HistoryEntry, HistoryLedger, Logger};
use crate::state::{RestoreStateStore, RestoreStatus, StateResult};

use super::request::PipelineStage;

/// How one unit's pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Restored,
    /// An open unit of the same name blocked the restore
    Conflict(String),
    Failed { stage: PipelineStage, reason: String },
}

pub struct ActivationPipeline<'a> {
    store: &'a RestoreStateStore,
    history: &'a dyn HistoryLedger,
}

impl<'a> ActivationPipeline<'a> {
    pub fn new(store: &'a RestoreStateStore, history: &'a dyn HistoryLedger) -> Self {
        Self { store, history }
    }

    /// Drive one unit through every stage.
    ///
    /// With `already_restored` the restore call is skipped and the
    /// remaining stages are applied to the live unit. Only state store
    /// failures are returned as errors.
    pub fn run(
        &self,
        gateway: &dyn ClusterGateway,
        repository: &str,
        unit: &RestorableUnit,
        already_restored: bool,
    ) -> StateResult<UnitOutcome> {
        let name = unit.source_unit_name.as_str();

        if !already_restored {
            match gateway.restore_snapshot(repository, &unit.snapshot_id, RestoreOptions::default()) {
                Ok(ack) if ack.accepted => {
                    Logger::event(
                        Event::RestoreAccepted,
                        &[("unit", name), ("snapshot", &unit.snapshot_id)],
                    );
                }
                Ok(_) => {
                    return Ok(self.failed(unit, PipelineStage::Restore, "restore was not accepted"));
                }
                Err(GatewayError::UnitAlreadyExists { .. }) => {
                    let reason = "an open unit with the same name already exists";
                    Logger::event(Event::RestoreConflict, &[("unit", name), ("reason", reason)]);
                    record(
                        self.history,
                        HistoryEntry::error(self.store.operator(), "RESTORE_CONFLICT", format!("{}: {}", name, reason)),
                    );
                    self.store.transition(name, RestoreStatus::Cancelled)?;
                    return Ok(UnitOutcome::Conflict(reason.to_string()));
                }
                Err(err) => {
                    return Ok(self.failed(unit, PipelineStage::Restore, &err.to_string()));
                }
            }
        }

        for stage in [
            PipelineStage::RemoveLifecyclePolicy,
            PipelineStage::DropReplicas,
            PipelineStage::Unhide,
        ] {
            let applied = match stage {
                PipelineStage::RemoveLifecyclePolicy => gateway.remove_lifecycle_policy(name),
                PipelineStage::DropReplicas => gateway.set_replica_count(name, 0),
                PipelineStage::Unhide => gateway.set_visibility(name, false),
                PipelineStage::Restore | PipelineStage::RecordRestored => continue,
            };
            if let Err(err) = applied {
                return Ok(self.failed(unit, stage, &err.to_string()));
            }
        }

        self.store.mark_restored(name)?;
        Logger::event(Event::UnitRestored, &[("unit", name), ("location", &unit.location)]);
        record(
            self.history,
            HistoryEntry::info(self.store.operator(), "UNIT_RESTORED", name),
        );
        Ok(UnitOutcome::Restored)
    }

    fn failed(&self, unit: &RestorableUnit, stage: PipelineStage, reason: &str) -> UnitOutcome {
        let name = unit.source_unit_name.as_str();
        Logger::event(
            Event::PipelineStageFailed,
            &[("unit", name), ("stage", stage.as_str()), ("reason", reason)],
        );
        record(
            self.history,
            HistoryEntry::error(
                self.store.operator(),
                "STAGE_FAILED",
                format!("{} failed at {}: {}", name, stage, reason),
            ),
        );
        UnitOutcome::Failed {
            stage,
            reason: reason.to_string(),
        }
    }
}
