//! CLI module for restorectl
//!
//! Provides command-line interface for:
//! - restore: discover, admit and restore matching units
//! - records: list restore records
//! - records-cancel: release stale init records
//! - purge: delete restored units past retention

mod args;
mod commands;
mod errors;
mod io;
mod prompt;

pub use args::{Cli, Command, RestoreArgs};
pub use commands::{build_request, purge, records, records_cancel, restore, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
pub use prompt::{parse_answer, StdinConfirmer};
