//! Orchestrator error types
//!
//! Errors that end a run. Named conflicts and per-unit stage failures are
//! not here; they are reported in the run result.

use std::fmt;

use crate::catalog::CatalogError;
use crate::gateway::GatewayError;
use crate::stability::StabilityError;
use crate::state::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run stopped because of the environment or the store
    Fatal,
    /// The run stopped because of operator input or an operator decision
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorCode {
    /// Cluster unreachable, auth failure or a failed discovery call
    RestoreConnectivity,
    /// Capacity or shard budget rejected the candidate set
    RestoreAdmissionRejected,
    /// Another operation holds `init` records
    RestoreSingleFlight,
    /// Cluster health below green
    RestoreClusterUnhealthy,
    /// Operator declined or interrupted the confirmation
    RestoreCancelled,
    /// Restore record store failed
    RestoreStateStore,
    /// Stability ceiling exceeded
    RestoreStabilityTimeout,
    /// Bad pattern, date or location
    RestoreInvalidInput,
}

impl RunErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunErrorCode::RestoreConnectivity => "RESTORE_CONNECTIVITY",
            RunErrorCode::RestoreAdmissionRejected => "RESTORE_ADMISSION_REJECTED",
            RunErrorCode::RestoreSingleFlight => "RESTORE_SINGLE_FLIGHT",
            RunErrorCode::RestoreClusterUnhealthy => "RESTORE_CLUSTER_UNHEALTHY",
            RunErrorCode::RestoreCancelled => "RESTORE_CANCELLED",
            RunErrorCode::RestoreStateStore => "RESTORE_STATE_STORE",
            RunErrorCode::RestoreStabilityTimeout => "RESTORE_STABILITY_TIMEOUT",
            RunErrorCode::RestoreInvalidInput => "RESTORE_INVALID_INPUT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RunErrorCode::RestoreConnectivity
            | RunErrorCode::RestoreStateStore
            | RunErrorCode::RestoreClusterUnhealthy => Severity::Fatal,
            RunErrorCode::RestoreAdmissionRejected
            | RunErrorCode::RestoreSingleFlight
            | RunErrorCode::RestoreCancelled
            | RunErrorCode::RestoreStabilityTimeout
            | RunErrorCode::RestoreInvalidInput => Severity::Error,
        }
    }
}

impl fmt::Display for RunErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error ending a restore run
#[derive(Debug)]
pub struct RunError {
    code: RunErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RunError {
    fn new(
        code: RunErrorCode,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn connectivity(message: impl Into<String>, source: GatewayError) -> Self {
        Self::new(RunErrorCode::RestoreConnectivity, message, Some(Box::new(source)))
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::RestoreConnectivity, message, None)
    }

    pub fn admission_rejected(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::RestoreAdmissionRejected, message, None)
    }

    pub fn single_flight(pending: u64) -> Self {
        Self::new(
            RunErrorCode::RestoreSingleFlight,
            format!(
                "another restore is in progress ({} record(s) in init); wait for it to finish",
                pending
            ),
            None,
        )
    }

    pub fn cluster_unhealthy(location: &str, status: &str) -> Self {
        Self::new(
            RunErrorCode::RestoreClusterUnhealthy,
            format!("cluster '{}' is {}, wait until it is green", location, status),
            None,
        )
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::RestoreCancelled, message, None)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(RunErrorCode::RestoreInvalidInput, message, None)
    }

    pub fn code(&self) -> RunErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<StateError> for RunError {
    fn from(err: StateError) -> Self {
        Self::new(
            RunErrorCode::RestoreStateStore,
            "restore state store failed",
            Some(Box::new(err)),
        )
    }
}

impl From<CatalogError> for RunError {
    fn from(err: CatalogError) -> Self {
        Self::new(RunErrorCode::RestoreInvalidInput, err.to_string(), None)
    }
}

impl From<StabilityError> for RunError {
    fn from(err: StabilityError) -> Self {
        Self::new(RunErrorCode::RestoreStabilityTimeout, err.to_string(), None)
    }
}

pub type OrchestratorResult<T> = Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RunError::single_flight(2).code().as_str(), "RESTORE_SINGLE_FLIGHT");
        assert_eq!(
            RunError::from(CatalogError::InvalidDate("x".into())).code(),
            RunErrorCode::RestoreInvalidInput
        );
        assert_eq!(
            RunError::from(StabilityError::Timeout {
                units: vec!["a".into()],
                waited: std::time::Duration::from_secs(1),
            })
            .code(),
            RunErrorCode::RestoreStabilityTimeout
        );
    }

    #[test]
    fn test_display() {
        let err = RunError::single_flight(2);
        let display = err.to_string();
        assert!(display.starts_with("[ERROR] RESTORE_SINGLE_FLIGHT:"));
        assert!(display.contains("2 record(s)"));

        let err = RunError::connectivity(
            "dc1 unreachable",
            GatewayError::Unreachable {
                endpoint: "es01:9200".into(),
                reason: "refused".into(),
            },
        );
        assert!(err.to_string().starts_with("[FATAL] RESTORE_CONNECTIVITY"));
        assert!(err.to_string().contains("caused by"));
    }
}
