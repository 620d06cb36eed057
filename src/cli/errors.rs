//! CLI-specific error types
//!
//! Errors raised below the CLI keep their own code so the JSON error
//! object names the real failure.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::orchestrator::RunError;
use crate::retention::PurgeError;
use crate::state::StateError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// I/O error (stdin/stdout, history file)
    IoError,
    /// Arguments valid for clap but not for this configuration
    InvalidArgs,
    /// Failure reported by a lower layer, carrying its code
    Operation(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::IoError => "RESTORE_CLI_IO_ERROR",
            Self::InvalidArgs => "RESTORE_CLI_INVALID_ARGS",
            Self::Operation(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgs, msg)
    }

    pub fn operation(code: &'static str, msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Operation(code), msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::operation(e.code().as_str(), e.message())
    }
}

impl From<StateError> for CliError {
    fn from(e: StateError) -> Self {
        Self::operation(e.code().as_str(), e.to_string())
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        Self::operation(e.code().as_str(), e.to_string())
    }
}

impl From<PurgeError> for CliError {
    fn from(e: PurgeError) -> Self {
        match e {
            PurgeError::State(state) => state.into(),
            cluster => Self::operation("RESTORE_CONNECTIVITY", cluster.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
