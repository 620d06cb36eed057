//! Configuration error types
//!
//! Configuration problems are FATAL: nothing runs against a cluster with a
//! config that failed to load or validate.

use std::fmt;

/// Config error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    /// File could not be read
    RestoreConfigRead,
    /// File is not valid JSON or does not match the schema
    RestoreConfigParse,
    /// Parsed but failed validation
    RestoreConfigInvalid,
}

impl ConfigErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigErrorCode::RestoreConfigRead => "RESTORE_CONFIG_READ",
            ConfigErrorCode::RestoreConfigParse => "RESTORE_CONFIG_PARSE",
            ConfigErrorCode::RestoreConfigInvalid => "RESTORE_CONFIG_INVALID",
        }
    }
}

impl fmt::Display for ConfigErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    code: ConfigErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    fn new(
        code: ConfigErrorCode,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::new(
            ConfigErrorCode::RestoreConfigRead,
            format!("cannot read {}", path.display()),
            Some(Box::new(source)),
        )
    }

    pub fn parse(source: serde_json::Error) -> Self {
        Self::new(
            ConfigErrorCode::RestoreConfigParse,
            "invalid configuration JSON",
            Some(Box::new(source)),
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorCode::RestoreConfigInvalid, message, None)
    }

    pub fn code(&self) -> ConfigErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
