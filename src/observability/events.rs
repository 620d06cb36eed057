//! Observable events of a restore run
//!
//! Events are explicit and typed. Free-form names are still accepted by
//! [`Logger::log`](super::Logger::log) for scopes.

use std::fmt;

use super::logger::Severity;

/// Everything the orchestrator and its collaborators can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Run lifecycle
    RunBegin,
    RunComplete,
    RunAborted,
    SingleFlightBlocked,
    DryRunExit,
    NothingToRestore,

    // Discovery
    EndpointUnreachable,
    CatalogMerged,
    DateTokenMalformed,
    CandidatesSelected,

    // Admission
    ClusterUnhealthy,
    ShardBudgetExceeded,
    CapacityRejected,
    AdmissionPassed,

    // Confirmation
    ConfirmationRequested,
    ConfirmationAccepted,
    ConfirmationDeclined,
    RecordsReleased,

    // Pipeline
    BatchBegin,
    BatchComplete,
    RestoreAccepted,
    RestoreConflict,
    PipelineStageFailed,
    UnitRestored,

    // Stability
    StabilityPoll,
    StabilityPollError,
    StabilityWaitComplete,
    StabilityTimeout,

    // Retention
    PurgeDeleted,
    PurgeKept,

    // History ledger
    HistoryWriteFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::RunBegin => "RESTORE_RUN_BEGIN",
            Event::RunComplete => "RESTORE_RUN_COMPLETE",
            Event::RunAborted => "RESTORE_RUN_ABORTED",
            Event::SingleFlightBlocked => "SINGLE_FLIGHT_BLOCKED",
            Event::DryRunExit => "DRY_RUN_EXIT",
            Event::NothingToRestore => "NOTHING_TO_RESTORE",

            Event::EndpointUnreachable => "ENDPOINT_UNREACHABLE",
            Event::CatalogMerged => "CATALOG_MERGED",
            Event::DateTokenMalformed => "DATE_TOKEN_MALFORMED",
            Event::CandidatesSelected => "CANDIDATES_SELECTED",

            Event::ClusterUnhealthy => "CLUSTER_UNHEALTHY",
            Event::ShardBudgetExceeded => "SHARD_BUDGET_EXCEEDED",
            Event::CapacityRejected => "ADMISSION_REJECTED",
            Event::AdmissionPassed => "ADMISSION_PASSED",

            Event::ConfirmationRequested => "CONFIRMATION_REQUESTED",
            Event::ConfirmationAccepted => "CONFIRMATION_ACCEPTED",
            Event::ConfirmationDeclined => "CONFIRMATION_DECLINED",
            Event::RecordsReleased => "RECORDS_RELEASED",

            Event::BatchBegin => "BATCH_BEGIN",
            Event::BatchComplete => "BATCH_COMPLETE",
            Event::RestoreAccepted => "RESTORE_ACCEPTED",
            Event::RestoreConflict => "RESTORE_CONFLICT",
            Event::PipelineStageFailed => "PIPELINE_STAGE_FAILED",
            Event::UnitRestored => "UNIT_RESTORED",

            Event::StabilityPoll => "STABILITY_POLL",
            Event::StabilityPollError => "STABILITY_POLL_ERROR",
            Event::StabilityWaitComplete => "STABILITY_WAIT_COMPLETE",
            Event::StabilityTimeout => "STABILITY_TIMEOUT",

            Event::PurgeDeleted => "PURGE_DELETED",
            Event::PurgeKept => "PURGE_KEPT",

            Event::HistoryWriteFailed => "HISTORY_WRITE_FAILED",
        }
    }

    /// Default severity when logged through [`super::Logger::event`]
    pub fn severity(&self) -> Severity {
        match self {
            Event::StabilityPoll => Severity::Trace,
            Event::EndpointUnreachable
            | Event::DateTokenMalformed
            | Event::StabilityPollError
            | Event::RestoreConflict
            | Event::HistoryWriteFailed
            | Event::ConfirmationDeclined => Severity::Warn,
            Event::SingleFlightBlocked
            | Event::ClusterUnhealthy
            | Event::ShardBudgetExceeded
            | Event::CapacityRejected
            | Event::PipelineStageFailed
            | Event::StabilityTimeout => Severity::Error,
            Event::RunAborted => Severity::Fatal,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_upper_snake() {
        let events = [
            Event::RunBegin,
            Event::CatalogMerged,
            Event::CapacityRejected,
            Event::RestoreConflict,
            Event::StabilityWaitComplete,
            Event::PurgeDeleted,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Event::RunAborted.severity(), Severity::Fatal);
        assert_eq!(Event::PipelineStageFailed.severity(), Severity::Error);
        assert_eq!(Event::StabilityPollError.severity(), Severity::Warn);
        assert_eq!(Event::UnitRestored.severity(), Severity::Info);
    }
}
