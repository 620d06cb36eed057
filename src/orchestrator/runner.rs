//! Restore run driver
//!
//! One call to [`RestoreOrchestrator::run`] is one operation:
//!
//! 1. single-flight check against the state store
//! 2. discovery and date matching per location
//! 3. health, capacity and shard budget checks
//! 4. `init` records, then operator confirmation
//! 5. batches through the activation pipeline, optionally waiting for
//!    stability after each batch
//!
//! Everything before step 4 is read-only. Control flow is sequential;
//! every cluster and store call blocks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::capacity::{AdmissionReport, NodeCapacityMap, RestorePlan};
use crate::catalog::{parse_target_date, CandidateSelector, RestorableUnit, SnapshotCatalog};
use crate::config::Config;
use crate::gateway::{ClusterGateway, GatewayError};
use crate::observability::history::record;
use crate::observability::{Event, HistoryEntry, HistoryLedger, Logger, ObservationScope, Timer};
use crate::stability::StabilityMonitor;
use crate::state::{RestoreStateStore, RestoreStatus, UpsertOutcome};

use super::confirmation::{Confirmer, Decision};
use super::errors::{OrchestratorResult, RunError};
use super::pipeline::{ActivationPipeline, UnitOutcome};
use super::request::{LocationAdmission, RunRequest, RunResult, UnitConflict, UnitFailure};
use super::topology::{Location, Topology};

/// Tunables taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub snapshot_prefix: String,
    pub safety_margin: f64,
    pub data_roles: Vec<String>,
    pub max_shards_per_node: u64,
    pub batch_size: usize,
    pub require_green: bool,
    pub poll_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            snapshot_prefix: "snapshot_".to_string(),
            safety_margin: 0.20,
            data_roles: vec![
                "data_content".to_string(),
                "data_hot".to_string(),
                "data_warm".to_string(),
            ],
            max_shards_per_node: 1000,
            batch_size: 3,
            require_green: true,
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            snapshot_prefix: config.snapshot_prefix.clone(),
            safety_margin: config.safety_margin,
            data_roles: config.data_roles.clone(),
            max_shards_per_node: config.max_shards_per_node,
            batch_size: config.batch_size,
            require_green: config.require_green,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Units found by discovery in one location
struct Discovered {
    location: Location,
    primary: Arc<dyn ClusterGateway>,
    units: Vec<RestorableUnit>,
}

/// One unit scheduled for the pipeline
#[derive(Debug, Clone)]
struct WorkItem {
    unit: RestorableUnit,
    /// Live already from an interrupted run; the restore call is skipped
    already_restored: bool,
}

pub struct RestoreOrchestrator {
    topology: Topology,
    store: RestoreStateStore,
    history: Arc<dyn HistoryLedger>,
    confirmer: Arc<dyn Confirmer>,
    settings: OrchestratorSettings,
}

impl RestoreOrchestrator {
    pub fn new(
        topology: Topology,
        store: RestoreStateStore,
        history: Arc<dyn HistoryLedger>,
        confirmer: Arc<dyn Confirmer>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            topology,
            store,
            history,
            confirmer,
            settings,
        }
    }

    pub fn store(&self) -> &RestoreStateStore {
        &self.store
    }

    /// Run one restore operation
    pub fn run(&self, request: &RunRequest) -> OrchestratorResult<RunResult> {
        let timer = Timer::new();
        Logger::event(
            Event::RunBegin,
            &[
                ("pattern", request.pattern.as_str()),
                ("target_date", request.target_date.as_str()),
                ("dry_run", if request.dry_run { "true" } else { "false" }),
                ("operator", self.store.operator()),
            ],
        );

        let outcome = self.execute(request, &timer);

        match &outcome {
            Ok(result) => {
                Logger::event(
                    Event::RunComplete,
                    &[
                        ("restored", &result.restored_units.len().to_string()),
                        ("conflicts", &result.conflicts.len().to_string()),
                        ("failures", &result.failures.len().to_string()),
                        ("elapsed_ms", &timer.elapsed_ms()),
                    ],
                );
                self.note(
                    "RUN_END",
                    format!(
                        "restored {} unit(s), {} conflict(s), {} failure(s) in {}ms",
                        result.restored_units.len(),
                        result.conflicts.len(),
                        result.failures.len(),
                        timer.elapsed_ms()
                    ),
                );
            }
            Err(err) => {
                Logger::event(
                    Event::RunAborted,
                    &[("code", err.code().as_str()), ("message", err.message())],
                );
                self.note_error("RUN_END", err.to_string());
            }
        }

        outcome
    }

    fn execute(&self, request: &RunRequest, timer: &Timer) -> OrchestratorResult<RunResult> {
        // Nothing may touch a cluster before the guard is checked
        let blocking = self.store.count_blocking(request.resume)?;
        if blocking > 0 {
            Logger::event(Event::SingleFlightBlocked, &[("pending", &blocking.to_string())]);
            self.note_error(
                "SINGLE_FLIGHT",
                format!("{} restore record(s) still in init", blocking),
            );
            return Err(RunError::single_flight(blocking));
        }

        self.note(
            "RUN_START",
            format!(
                "query '{}' at or before {} in [{}]",
                request.pattern,
                request.target_date,
                request.locations.join(",")
            ),
        );

        let target = parse_target_date(&request.target_date)?;
        let selector = CandidateSelector::new(&request.pattern, target)?;
        let locations = self.resolve_locations(&request.locations)?;

        let batch_size = request.batch_size.unwrap_or(self.settings.batch_size);
        if batch_size == 0 {
            return Err(RunError::invalid_input("batch size must be > 0"));
        }
        let max_shards = request
            .max_shards_per_node
            .unwrap_or(self.settings.max_shards_per_node);
        if max_shards == 0 {
            return Err(RunError::invalid_input("max shards per node must be > 0"));
        }

        let adopted: BTreeSet<String> = if request.resume {
            self.store.owned_init_units()?.into_iter().collect()
        } else {
            BTreeSet::new()
        };

        let mut result = RunResult {
            dry_run: request.dry_run,
            ..RunResult::default()
        };

        // Discovery and classification
        let mut discovered = Vec::with_capacity(locations.len());
        for location in locations {
            discovered.push(self.discover(location, &selector)?);
        }

        let mut fresh: BTreeMap<String, Vec<RestorableUnit>> = BTreeMap::new();
        let mut resumed: Vec<WorkItem> = Vec::new();
        for found in &discovered {
            for unit in &found.units {
                let name = &unit.source_unit_name;
                if let Some(existing) = self.store.get(name)? {
                    if existing.status == RestoreStatus::Restored {
                        result.skipped_restored.push(name.clone());
                        continue;
                    }
                }
                if unit.already_active {
                    if adopted.contains(name) {
                        resumed.push(WorkItem {
                            unit: unit.clone(),
                            already_restored: true,
                        });
                    } else {
                        result.skipped_active.push(name.clone());
                    }
                    continue;
                }
                fresh
                    .entry(found.location.name.clone())
                    .or_default()
                    .push(unit.clone());
            }
        }

        if fresh.is_empty() && resumed.is_empty() {
            Logger::event(
                Event::NothingToRestore,
                &[
                    ("skipped_active", &result.skipped_active.len().to_string()),
                    ("skipped_restored", &result.skipped_restored.len().to_string()),
                ],
            );
            self.note("NOTHING_TO_RESTORE", "no candidate needs restoring");
            result.elapsed = timer.elapsed();
            return Ok(result);
        }

        // Health and admission
        for found in &discovered {
            let name = &found.location.name;
            let has_work = fresh.contains_key(name)
                || resumed.iter().any(|item| &item.unit.location == name);
            if has_work {
                self.check_health(found)?;
            }
            if let Some(units) = fresh.get(name) {
                result
                    .admission
                    .push(self.admit(found, units, max_shards, batch_size)?);
            }
        }

        result.admitted_count = result
            .admission
            .iter()
            .map(|a| a.report.admitted_count())
            .sum();
        result.rejected_count = result
            .admission
            .iter()
            .map(|a| a.report.rejected_units().len())
            .sum();

        let rejected: Vec<&LocationAdmission> = result
            .admission
            .iter()
            .filter(|a| a.report.is_rejected())
            .collect();
        if !rejected.is_empty() && !request.dry_run {
            let message = rejection_message(&rejected);
            self.note_error("ADMISSION_REJECTED", message.clone());
            return Err(RunError::admission_rejected(message));
        }

        if request.dry_run {
            Logger::event(
                Event::DryRunExit,
                &[
                    ("admitted", &result.admitted_count.to_string()),
                    ("rejected", &result.rejected_count.to_string()),
                ],
            );
            self.note("DRY_RUN_EXIT", "dry run, nothing was changed");
            result.elapsed = timer.elapsed();
            return Ok(result);
        }

        // Queue, confirm, execute
        let work = self.work_list(&discovered, &fresh, resumed);
        let queued = self.queue(&work)?;

        if !request.assume_yes {
            let summary = render_summary(&result.admission, &work);
            Logger::event(Event::ConfirmationRequested, &[("units", &work.len().to_string())]);
            let decision = self.confirmer.confirm(&summary);
            if !decision.is_accept() {
                Logger::event(Event::ConfirmationDeclined, &[("decision", decision.as_str())]);
                self.release(&queued)?;
                let message = match decision {
                    Decision::Cancel => "restore interrupted at confirmation",
                    _ => "restore declined by operator",
                };
                self.note_error("CONFIRMATION", message);
                return Err(RunError::cancelled(message));
            }
            Logger::event(Event::ConfirmationAccepted, &[("units", &work.len().to_string())]);
            self.note("CONFIRMATION", "operator accepted the plan");
        }

        let primaries: BTreeMap<String, Arc<dyn ClusterGateway>> = discovered
            .iter()
            .map(|d| (d.location.name.clone(), Arc::clone(&d.primary)))
            .collect();

        self.execute_batches(request, &discovered, &primaries, &work, batch_size, &mut result)?;

        result.elapsed = timer.elapsed();
        Ok(result)
    }

    fn resolve_locations(&self, requested: &[String]) -> OrchestratorResult<Vec<&Location>> {
        let names = if requested.is_empty() {
            self.topology.names()
        } else {
            requested.to_vec()
        };

        let mut locations: Vec<&Location> = Vec::with_capacity(names.len());
        for name in &names {
            let location = self
                .topology
                .get(name)
                .ok_or_else(|| RunError::invalid_input(format!("unknown location '{}'", name)))?;
            if !locations.iter().any(|l| l.name == location.name) {
                locations.push(location);
            }
        }

        if locations.is_empty() {
            return Err(RunError::invalid_input("no locations configured"));
        }
        Ok(locations)
    }

    /// Merge every endpoint's listing, select candidates and size them.
    ///
    /// Endpoints that do not answer are skipped; a location with no
    /// answering endpoint fails the run.
    fn discover(&self, location: &Location, selector: &CandidateSelector) -> OrchestratorResult<Discovered> {
        let scope = ObservationScope::with_fields("DISCOVERY", &[("location", location.name.as_str())]);
        let mut catalog = SnapshotCatalog::new(location.name.clone());
        let mut primary: Option<Arc<dyn ClusterGateway>> = None;
        let mut last_error: Option<GatewayError> = None;

        for gateway in &location.gateways {
            let endpoint = gateway.endpoint().to_string();
            let listing = match gateway.ping() {
                Ok(true) => gateway.list_snapshots(&location.repository),
                Ok(false) => Err(GatewayError::Unreachable {
                    endpoint: endpoint.clone(),
                    reason: "endpoint is not serving".to_string(),
                }),
                Err(err) => Err(err),
            };

            match listing {
                Ok(listings) => {
                    let added = catalog.merge(gateway.endpoint(), listings);
                    Logger::event(
                        Event::CatalogMerged,
                        &[
                            ("location", location.name.as_str()),
                            ("endpoint", &endpoint),
                            ("added", &added.to_string()),
                            ("total", &catalog.len().to_string()),
                        ],
                    );
                    primary.get_or_insert_with(|| Arc::clone(gateway));
                }
                Err(err) => {
                    let reason = err.to_string();
                    Logger::event(
                        Event::EndpointUnreachable,
                        &[
                            ("location", location.name.as_str()),
                            ("endpoint", &endpoint),
                            ("reason", &reason),
                        ],
                    );
                    last_error = Some(err);
                }
            }
        }

        let primary = match primary {
            Some(primary) => primary,
            None => {
                scope.fail("no endpoint answered");
                let message = format!("no endpoint of location '{}' answered", location.name);
                return Err(match last_error {
                    Some(err) => RunError::connectivity(message, err),
                    None => RunError::unreachable(message),
                });
            }
        };

        let live: BTreeSet<String> = primary
            .live_units()
            .map_err(|e| RunError::connectivity(format!("list units in '{}'", location.name), e))?
            .into_iter()
            .collect();

        let selected = selector.select(&catalog);
        let mut units = Vec::with_capacity(selected.len());
        for entry in selected {
            let gateway = location.gateway_for(&entry.endpoint).unwrap_or(&primary);
            let size = gateway
                .snapshot_size(&location.repository, &entry.listing.id)
                .map_err(|e| RunError::connectivity(format!("size of snapshot {}", entry.listing.id), e))?;
            let name = crate::catalog::source_unit_name(&entry.listing.id, &self.settings.snapshot_prefix);
            let active = live.contains(&name);
            units.push(RestorableUnit::from_entry(
                entry,
                &location.name,
                &self.settings.snapshot_prefix,
                size,
                active,
            ));
        }

        Logger::event(
            Event::CandidatesSelected,
            &[
                ("location", location.name.as_str()),
                ("catalog", &catalog.len().to_string()),
                ("selected", &units.len().to_string()),
            ],
        );
        scope.complete_with_fields(&[("candidates", &units.len().to_string())]);

        Ok(Discovered {
            location: location.clone(),
            primary,
            units,
        })
    }

    fn check_health(&self, found: &Discovered) -> OrchestratorResult<()> {
        let health = found.primary.cluster_health().map_err(|e| {
            RunError::connectivity(format!("health of '{}'", found.location.name), e)
        })?;

        if self.settings.require_green && !health.status.is_best() {
            Logger::event(
                Event::ClusterUnhealthy,
                &[
                    ("location", found.location.name.as_str()),
                    ("status", health.status.as_str()),
                ],
            );
            return Err(RunError::cluster_unhealthy(&found.location.name, health.status.as_str()));
        }
        Ok(())
    }

    fn admit(
        &self,
        found: &Discovered,
        units: &[RestorableUnit],
        max_shards: u64,
        batch_size: usize,
    ) -> OrchestratorResult<LocationAdmission> {
        let name = found.location.name.as_str();
        let scope = ObservationScope::with_fields("ADMISSION", &[("location", name)]);

        let stats = found
            .primary
            .node_stats()
            .map_err(|e| RunError::connectivity(format!("node stats of '{}'", name), e))?;
        let shards = found
            .primary
            .shards_per_node()
            .map_err(|e| RunError::connectivity(format!("shard placement of '{}'", name), e))?;

        let as_built = NodeCapacityMap::build(&stats, self.settings.safety_margin, &self.settings.data_roles);
        let mut ledger = as_built.clone();
        let report = AdmissionReport::evaluate(units, &mut ledger, &shards, max_shards);
        let plan = RestorePlan::new(units, &as_built, &report.shard_budget, batch_size);

        let budget = &report.shard_budget;
        if budget.is_exceeded() {
            Logger::event(
                Event::ShardBudgetExceeded,
                &[
                    ("location", name),
                    ("requested", &budget.requested.to_string()),
                    ("remaining", &budget.remaining.to_string()),
                ],
            );
        }
        for unit in &report.placement.rejected {
            Logger::event(
                Event::CapacityRejected,
                &[
                    ("location", name),
                    ("unit", unit.source_unit_name.as_str()),
                    ("size_bytes", &unit.size_bytes.to_string()),
                ],
            );
        }
        if !report.is_rejected() {
            Logger::event(
                Event::AdmissionPassed,
                &[("location", name), ("units", &units.len().to_string())],
            );
        }

        self.note(
            "PLAN",
            format!(
                "{}: {} unit(s), {} shard(s), {} byte(s), {} rejected",
                name,
                plan.units.len(),
                plan.total_shards,
                plan.total_bytes,
                report.rejected_units().len()
            ),
        );
        scope.complete_with_fields(&[("rejected", &report.rejected_units().len().to_string())]);

        Ok(LocationAdmission {
            location: name.to_string(),
            report,
            plan,
        })
    }

    /// Fresh units in location order, then units adopted from an earlier run
    fn work_list(
        &self,
        discovered: &[Discovered],
        fresh: &BTreeMap<String, Vec<RestorableUnit>>,
        resumed: Vec<WorkItem>,
    ) -> Vec<WorkItem> {
        let mut work = Vec::new();
        for found in discovered {
            if let Some(units) = fresh.get(&found.location.name) {
                work.extend(units.iter().map(|unit| WorkItem {
                    unit: unit.clone(),
                    already_restored: false,
                }));
            }
        }
        work.extend(resumed);
        work
    }

    /// Put every work item in `init`; returns the units this run now owns
    fn queue(&self, work: &[WorkItem]) -> OrchestratorResult<Vec<String>> {
        let mut queued = Vec::with_capacity(work.len());
        for item in work {
            let name = &item.unit.source_unit_name;
            match self.store.upsert(name, RestoreStatus::Init)? {
                UpsertOutcome::Created
                | UpsertOutcome::Requeued
                | UpsertOutcome::Unchanged(RestoreStatus::Init) => queued.push(name.clone()),
                UpsertOutcome::Unchanged(_) => {}
            }
        }
        self.note("QUEUED", format!("{} unit(s) set to init", queued.len()));
        Ok(queued)
    }

    /// Move this run's records to `cancelled`
    fn release(&self, queued: &[String]) -> OrchestratorResult<()> {
        for name in queued {
            self.store.transition(name, RestoreStatus::Cancelled)?;
        }
        Logger::event(Event::RecordsReleased, &[("count", &queued.len().to_string())]);
        Ok(())
    }

    fn execute_batches(
        &self,
        request: &RunRequest,
        discovered: &[Discovered],
        primaries: &BTreeMap<String, Arc<dyn ClusterGateway>>,
        work: &[WorkItem],
        batch_size: usize,
        result: &mut RunResult,
    ) -> OrchestratorResult<()> {
        let pipeline = ActivationPipeline::new(&self.store, self.history.as_ref());
        let total = work.chunks(batch_size).count().to_string();

        for (index, batch) in work.chunks(batch_size).enumerate() {
            let number = (index + 1).to_string();
            Logger::event(
                Event::BatchBegin,
                &[("batch", &number), ("of", &total), ("units", &batch.len().to_string())],
            );
            let names: Vec<&str> = batch.iter().map(|i| i.unit.source_unit_name.as_str()).collect();
            self.note("BATCH", format!("batch {}/{}: {}", number, total, names.join(", ")));

            let mut settled: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in batch {
                let unit = &item.unit;
                let Some(found) = discovered.iter().find(|d| d.location.name == unit.location) else {
                    continue;
                };
                let gateway = found
                    .location
                    .gateway_for(&unit.endpoint)
                    .unwrap_or(&found.primary);

                match pipeline.run(gateway.as_ref(), &found.location.repository, unit, item.already_restored)? {
                    UnitOutcome::Restored => {
                        result.restored_units.push(unit.source_unit_name.clone());
                        if item.already_restored {
                            result.resumed_units.push(unit.source_unit_name.clone());
                        }
                        settled
                            .entry(unit.location.clone())
                            .or_default()
                            .push(unit.source_unit_name.clone());
                    }
                    UnitOutcome::Conflict(reason) => result.conflicts.push(UnitConflict {
                        unit: unit.source_unit_name.clone(),
                        location: unit.location.clone(),
                        reason,
                    }),
                    UnitOutcome::Failed { stage, reason } => result.failures.push(UnitFailure {
                        unit: unit.source_unit_name.clone(),
                        location: unit.location.clone(),
                        stage,
                        reason,
                    }),
                }
            }
            result.batches += 1;
            Logger::event(Event::BatchComplete, &[("batch", &number), ("of", &total)]);

            if request.wait_for_stable && !settled.is_empty() {
                let mut waited = Duration::ZERO;
                for (location, units) in &settled {
                    let Some(gateway) = primaries.get(location) else {
                        continue;
                    };
                    let monitor = StabilityMonitor::new(
                        Arc::clone(gateway),
                        self.settings.poll_interval,
                        request.max_wait,
                    );
                    waited += monitor.wait_for_stable(units)?;
                }
                self.note(
                    "STABLE",
                    format!("batch {}/{} stable after {}ms", number, total, waited.as_millis()),
                );
                result.stability_waits.push(waited);
            }
        }

        Ok(())
    }

    fn note(&self, action: &str, message: impl Into<String>) {
        record(
            self.history.as_ref(),
            HistoryEntry::info(self.store.operator(), action, message),
        );
    }

    fn note_error(&self, action: &str, message: impl Into<String>) {
        record(
            self.history.as_ref(),
            HistoryEntry::error(self.store.operator(), action, message),
        );
    }
}

fn rejection_message(rejected: &[&LocationAdmission]) -> String {
    let mut message = String::from("admission rejected");
    for admission in rejected {
        let budget = &admission.report.shard_budget;
        let _ = write!(
            message,
            "; {}: units [{}], shards requested {} of {} remaining",
            admission.location,
            admission.report.rejected_units().join(", "),
            budget.requested,
            budget.remaining
        );
    }
    message
}

fn render_summary(admission: &[LocationAdmission], work: &[WorkItem]) -> String {
    let mut text = String::new();
    for entry in admission {
        let _ = writeln!(text, "[{}]", entry.location);
        let _ = writeln!(text, "{}", entry.plan);
    }
    let resumed: Vec<&str> = work
        .iter()
        .filter(|item| item.already_restored)
        .map(|item| item.unit.source_unit_name.as_str())
        .collect();
    if !resumed.is_empty() {
        let _ = writeln!(text, "Finishing interrupted units:");
        for name in resumed {
            let _ = writeln!(text, "    - {}", name);
        }
    }
    text.push_str("Proceed with restore?");
    text
}
