//! Transport errors raised by cluster gateways

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors a single gateway call can produce
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The restore was refused because an open unit with the same name exists
    #[error("an open unit named '{unit}' already exists in the cluster")]
    UnitAlreadyExists { unit: String },

    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("authentication rejected by {endpoint}")]
    AuthFailed { endpoint: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    /// The cluster answered but reported a partial failure
    #[error("operation reported failures: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Connectivity problems are fatal to a whole run
    pub fn is_connectivity(&self) -> bool {
        matches!(self, GatewayError::Unreachable { .. } | GatewayError::AuthFailed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::UnitAlreadyExists { .. })
    }

    /// Short machine-readable kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::UnitAlreadyExists { .. } => "unit_already_exists",
            GatewayError::Unreachable { .. } => "unreachable",
            GatewayError::AuthFailed { .. } => "auth_failed",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Http { .. } => "http",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Decode(_) => "decode",
            GatewayError::Rejected(_) => "rejected",
        }
    }
}
