//! CLI argument definitions using clap
//!
//! Commands:
//! - restorectl restore -c <pattern> -d <YYYY.MM.DD> [options]
//! - restorectl records [--status <status>]
//! - restorectl records-cancel [-y]
//! - restorectl purge [--max-days N] [-n] [-y]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::state::RestoreStatus;

/// restorectl - restore snapshotted units into a live cluster
#[derive(Parser, Debug)]
#[command(name = "restorectl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore every unit matching a pattern as of a date
    Restore(RestoreArgs),

    /// List restore records
    Records {
        /// Only records in this status
        #[arg(long, value_parser = parse_status)]
        status: Option<RestoreStatus>,
    },

    /// Cancel every record still in init
    RecordsCancel {
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Delete restored units older than the retention limit
    Purge {
        /// Overrides restored_max_days from the configuration
        #[arg(long)]
        max_days: Option<u32>,

        /// Report what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Regular expression over snapshot ids
    #[arg(short = 'c', long)]
    pub pattern: String,

    /// Target date, YYYY.MM.DD
    #[arg(short = 'd', long)]
    pub date: String,

    /// Comma separated locations; all configured locations when omitted
    #[arg(short = 'l', long, value_delimiter = ',')]
    pub locations: Vec<String>,

    #[arg(short = 'b', long)]
    pub batch_size: Option<usize>,

    /// Per-node shard limit
    #[arg(short = 'm', long)]
    pub max_shards: Option<u64>,

    /// Wait for every batch to become stable
    #[arg(short = 't', long = "wait")]
    pub wait_for_stable: bool,

    /// Plan only, change nothing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Adopt your own unfinished records
    #[arg(long)]
    pub resume: bool,

    /// Give up waiting for stability after this many seconds
    #[arg(long, requires = "wait_for_stable")]
    pub max_wait: Option<u64>,
}

fn parse_status(value: &str) -> Result<RestoreStatus, String> {
    RestoreStatus::parse(&value.to_lowercase())
        .ok_or_else(|| format!("unknown status '{}', expected init, restored or cancelled", value))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
