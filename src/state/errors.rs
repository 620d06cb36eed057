//! State store error types
//!
//! The state store is the system of record for mutual exclusion, so every
//! failure against it is FATAL to the current operation.

use std::fmt;

use crate::gateway::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorCode {
    /// Backing store read or write failed
    RestoreStateStore,
    /// A stored record could not be decoded
    RestoreStateCorrupt,
}

impl StateErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateErrorCode::RestoreStateStore => "RESTORE_STATE_STORE",
            StateErrorCode::RestoreStateCorrupt => "RESTORE_STATE_CORRUPT",
        }
    }
}

impl fmt::Display for StateErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State store error
#[derive(Debug)]
pub struct StateError {
    code: StateErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StateError {
    pub fn store(message: impl Into<String>, source: GatewayError) -> Self {
        Self {
            code: StateErrorCode::RestoreStateStore,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: StateErrorCode::RestoreStateStore,
            message: message.into(),
            source: None,
        }
    }

    pub fn corrupt(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            code: StateErrorCode::RestoreStateCorrupt,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn code(&self) -> StateErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type StateResult<T> = Result<T, StateError>;
