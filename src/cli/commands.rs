//! CLI command implementations
//!
//! Each command loads the configuration, wires gateways, the record store
//! and the history ledger, then hands off to the library. Records and
//! history live on the first answering endpoint of the first requested
//! location.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Config;
use crate::gateway::ClusterGateway;
use crate::observability::history::record;
use crate::observability::{
    ClusterHistoryLedger, Event, FileHistoryLedger, HistoryEntry, HistoryLedger, Logger,
    TeeHistoryLedger,
};
use crate::orchestrator::{
    Confirmer, FixedConfirmer, OrchestratorSettings, RestoreOrchestrator, RunError, RunRequest,
    Topology,
};
use crate::retention::RetentionPurger;
use crate::state::{current_operator, IndexRecordBackend, RestoreStateStore, RestoreStatus};

use super::args::{Cli, Command, RestoreArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use super::prompt::StdinConfirmer;

/// Main CLI entry point
///
/// Parses arguments, runs the command and prints its JSON outcome. An
/// error is printed as a JSON error object and also returned so the
/// process exits non-zero.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(&cli) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run one command and return its `data` payload
pub fn run_command(cli: &Cli) -> CliResult<Value> {
    let config = load_config(&cli.config)?;
    match &cli.command {
        Command::Restore(args) => restore(&config, args),
        Command::Records { status } => records(&config, *status),
        Command::RecordsCancel { yes } => records_cancel(&config, *yes),
        Command::Purge {
            max_days,
            dry_run,
            yes,
        } => purge(&config, *max_days, *dry_run, *yes),
    }
}

fn load_config(path: &Path) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::event(
        Event::ConfigLoaded,
        &[
            ("path", &path.display().to_string()),
            ("locations", &config.location_names().join(",")),
        ],
    );
    Ok(config)
}

/// Everything a command needs from the environment
struct Session {
    topology: Topology,
    store: RestoreStateStore,
    history: Arc<dyn HistoryLedger>,
}

impl Session {
    fn open(config: &Config, requested: &[String]) -> CliResult<Self> {
        let topology = Topology::from_config(config);
        let home = topology.home_gateway(requested).ok_or_else(|| {
            CliError::invalid_args(format!("no endpoint for location(s) [{}]", requested.join(",")))
        })?;

        let backend = IndexRecordBackend::new(Arc::clone(&home), config.restored_index.clone());
        let store = RestoreStateStore::new(Arc::new(backend), current_operator());
        let history = open_history(config, home)?;

        Ok(Self {
            topology,
            store,
            history,
        })
    }

    fn note(&self, action: &str, message: impl Into<String>) {
        record(
            self.history.as_ref(),
            HistoryEntry::info(self.store.operator(), action, message),
        );
    }

    /// The first answering endpoint of every location
    fn reachable_gateways(&self) -> Vec<Arc<dyn ClusterGateway>> {
        let mut gateways = Vec::new();
        for name in self.topology.names() {
            let Some(location) = self.topology.get(&name) else {
                continue;
            };
            match location.first_reachable() {
                Some(gw) => gateways.push(Arc::clone(gw)),
                None => Logger::event(
                    Event::EndpointUnreachable,
                    &[("location", name.as_str()), ("reason", "no endpoint answered")],
                ),
            }
        }
        gateways
    }
}

fn open_history(config: &Config, home: Arc<dyn ClusterGateway>) -> CliResult<Arc<dyn HistoryLedger>> {
    let cluster: Arc<dyn HistoryLedger> =
        Arc::new(ClusterHistoryLedger::new(home, config.history_index.clone()));

    match &config.history_file {
        Some(path) => {
            let file = FileHistoryLedger::open(path).map_err(|e| {
                CliError::io_error(format!("cannot open history file {}: {}", path.display(), e))
            })?;
            Ok(Arc::new(TeeHistoryLedger::new(vec![cluster, Arc::new(file)])))
        }
        None => Ok(cluster),
    }
}

fn confirmer(assume_yes: bool) -> CliResult<Arc<dyn Confirmer>> {
    if assume_yes {
        return Ok(Arc::new(FixedConfirmer::accept()));
    }
    Ok(Arc::new(StdinConfirmer::install()?))
}

/// Translate restore arguments into a run request
pub fn build_request(args: &RestoreArgs) -> RunRequest {
    RunRequest {
        pattern: args.pattern.clone(),
        target_date: args.date.clone(),
        locations: args
            .locations
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        batch_size: args.batch_size,
        max_shards_per_node: args.max_shards,
        wait_for_stable: args.wait_for_stable,
        dry_run: args.dry_run,
        assume_yes: args.yes,
        resume: args.resume,
        max_wait: args.max_wait.map(Duration::from_secs),
    }
}

/// Restore every unit matching the pattern as of the date
pub fn restore(config: &Config, args: &RestoreArgs) -> CliResult<Value> {
    let request = build_request(args);
    let session = Session::open(config, &request.locations)?;
    let confirmer = confirmer(request.assume_yes || request.dry_run)?;

    let orchestrator = RestoreOrchestrator::new(
        session.topology,
        session.store,
        session.history,
        confirmer,
        OrchestratorSettings::from_config(config),
    );

    let result = orchestrator.run(&request)?;
    Ok(serde_json::to_value(&result)?)
}

/// List restore records, optionally by status
pub fn records(config: &Config, status: Option<RestoreStatus>) -> CliResult<Value> {
    let session = Session::open(config, &[])?;
    let records = session.store.list(status)?;
    Ok(json!({
        "count": records.len(),
        "records": records,
    }))
}

/// Release a stale single-flight guard by cancelling every init record
pub fn records_cancel(config: &Config, yes: bool) -> CliResult<Value> {
    let session = Session::open(config, &[])?;
    let pending = session.store.list(Some(RestoreStatus::Init))?;
    if pending.is_empty() {
        return Ok(json!({ "cancelled": Vec::<String>::new() }));
    }

    if !yes {
        let mut summary = format!("{} record(s) in init:\n", pending.len());
        for entry in &pending {
            summary.push_str(&format!("    - {} (requested by {})\n", entry.unit_name, entry.requested_by));
        }
        summary.push_str("Cancel them?");
        let decision = confirmer(false)?.confirm(&summary);
        if !decision.is_accept() {
            return Err(RunError::cancelled("records left untouched").into());
        }
    }

    let cancelled = session.store.cancel_all_init()?;
    Logger::event(Event::RecordsReleased, &[("count", &cancelled.len().to_string())]);
    session.note(
        "RECORDS_CANCEL",
        format!("cancelled {} init record(s): {}", cancelled.len(), cancelled.join(", ")),
    );
    Ok(json!({ "cancelled": cancelled }))
}

/// Delete restored units whose records are older than the limit
pub fn purge(config: &Config, max_days: Option<u32>, dry_run: bool, yes: bool) -> CliResult<Value> {
    let max_days = max_days.or(config.restored_max_days).ok_or_else(|| {
        CliError::invalid_args("no retention limit: pass --max-days or set restored_max_days")
    })?;

    let session = Session::open(config, &[])?;

    if !dry_run && !yes {
        let summary = format!(
            "Delete every restored unit older than {} day(s) in [{}]?",
            max_days,
            session.topology.names().join(",")
        );
        if !confirmer(false)?.confirm(&summary).is_accept() {
            return Err(RunError::cancelled("purge declined by operator").into());
        }
    }

    let gateways = session.reachable_gateways();
    let report = RetentionPurger::new(&session.store, gateways, session.history.as_ref())
        .purge(max_days, dry_run)?;
    Ok(serde_json::to_value(&report)?)
}
