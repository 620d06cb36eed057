//! Restore invariant tests
//!
//! Test Categories:
//! 1. Admission safety
//! 2. Dry-run purity
//! 3. Idempotent re-entry and resume
//! 4. Cluster health and connectivity
//! 5. Batching and stability
//! 6. Records stored in the cluster

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, OPERATOR, REPOSITORY};
use restorectl::gateway::{ClusterGateway, Endpoint, HealthColor};
use restorectl::observability::{ClusterHistoryLedger, MemoryHistoryLedger};
use restorectl::orchestrator::{
    FixedConfirmer, Location, OrchestratorSettings, RestoreOrchestrator, RunErrorCode, RunRequest, Topology,
};
use restorectl::state::{IndexRecordBackend, RestoreStateStore, RestoreStatus};

// =============================================================================
// ADMISSION SAFETY
// =============================================================================

/// No node is debited past its available bytes.
#[test]
fn test_admitted_units_fit_their_nodes() {
    let h = Harness::bare();
    h.gw.add_node("node-1", &["data_hot"], 2000, 900, 0);
    h.gw.add_node("node-2", &["data_hot"], 2000, 700, 0);
    for (series, size) in [("a", 500), ("b", 450), ("c", 300), ("d", 250), ("e", 100)] {
        h.snapshot(series, "2024.01.01", 1, size);
    }

    let result = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").dry_run())
        .unwrap();

    let admission = &result.admission[0];
    let mut used = std::collections::BTreeMap::<String, u64>::new();
    for unit in &admission.report.placement.admitted {
        let node = &admission.report.placement.assignments[&unit.source_unit_name];
        *used.entry(node.clone()).or_default() += unit.size_bytes;
    }
    assert!(used.get("node-1").copied().unwrap_or(0) < 900);
    assert!(used.get("node-2").copied().unwrap_or(0) < 700);
    assert_eq!(admission.plan.total_bytes, 1600);
}

/// Nodes without a data role never receive units.
#[test]
fn test_non_data_nodes_are_ignored() {
    let h = Harness::bare();
    h.gw.add_node("master-1", &["master"], 1_000_000, 1_000_000, 0);
    h.gw.add_node("node-1", &["data_hot"], 1000, 100, 0);
    h.snapshot("a", "2024.01.01", 1, 500);

    let err = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreAdmissionRejected);
}

/// The safety margin is held back from every node.
#[test]
fn test_safety_margin_is_reserved() {
    let mut h = Harness::bare();
    h.settings.safety_margin = 0.5;
    h.gw.add_node("node-1", &["data_hot"], 1000, 600, 0);
    h.snapshot("a", "2024.01.01", 1, 150);

    let err = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap_err();

    // 600 available minus 500 reserved leaves 100
    assert_eq!(err.code(), RunErrorCode::RestoreAdmissionRejected);
}

/// Exceeding the shard budget rejects the whole candidate set.
#[test]
fn test_shard_budget_rejects_everything() {
    let h = Harness::bare();
    h.gw.add_node("node-1", &["data_hot"], 1_000_000, 1_000_000, 8);
    h.gw.add_node("node-2", &["data_hot"], 1_000_000, 1_000_000, 8);
    h.snapshot("a", "2024.01.01", 2, 10);
    h.snapshot("b", "2024.01.01", 3, 10);

    let request = RunRequest {
        max_shards_per_node: Some(10),
        ..RunRequest::new("snapshot_", "2024.01.01").assume_yes()
    };
    let err = h.orchestrator().run(&request).unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreAdmissionRejected);
    assert!(err.message().contains("requested 5 of 4 remaining"));
    assert!(h.gw.mutating_calls().is_empty());
}

/// Exactly filling the shard budget is allowed.
#[test]
fn test_shard_budget_can_be_filled_exactly() {
    let h = Harness::bare();
    h.gw.add_node("node-1", &["data_hot"], 1_000_000, 1_000_000, 8);
    h.gw.add_node("node-2", &["data_hot"], 1_000_000, 1_000_000, 8);
    h.snapshot("a", "2024.01.01", 4, 10);

    let request = RunRequest {
        max_shards_per_node: Some(10),
        ..RunRequest::new("snapshot_", "2024.01.01").assume_yes()
    };
    let result = h.orchestrator().run(&request).unwrap();

    assert_eq!(result.restored_units.len(), 1);
}

// =============================================================================
// DRY-RUN PURITY
// =============================================================================

/// A dry run changes neither the cluster nor the record store.
#[test]
fn test_dry_run_changes_nothing() {
    let h = Harness::new();
    h.snapshot("a", "2024.01.01", 1, 100);
    h.snapshot("b", "2024.01.01", 1, 100);
    let confirmer = Arc::new(FixedConfirmer::accept());

    let result = h
        .orchestrator_with(Arc::clone(&confirmer))
        .run(&RunRequest::new("snapshot_", "2024.01.01").dry_run())
        .unwrap();

    assert!(result.dry_run);
    assert_eq!(result.admitted_count, 2);
    assert!(result.restored_units.is_empty());
    assert!(h.gw.mutating_calls().is_empty());
    assert!(h.backend.records().is_empty());
    assert!(confirmer.shown().is_empty());
    assert!(h.history.actions().contains(&"DRY_RUN_EXIT".to_string()));
}

/// With records and history kept in the cluster, a dry run writes history
/// entries and nothing else.
#[test]
fn test_dry_run_with_cluster_records_writes_only_history() {
    let h = Harness::new();
    h.snapshot("a", "2024.01.01", 1, 100);
    let gateway: Arc<dyn ClusterGateway> = Arc::new(h.gw.clone());
    let store = RestoreStateStore::new(
        Arc::new(IndexRecordBackend::new(Arc::clone(&gateway), "rc_snapshots")),
        OPERATOR,
    );

    RestoreOrchestrator::new(
        h.topology(),
        store,
        Arc::new(ClusterHistoryLedger::new(gateway, "rc_snapshots_history")),
        Arc::new(FixedConfirmer::accept()),
        h.settings.clone(),
    )
    .run(&RunRequest::new("snapshot_", "2024.01.01").dry_run())
    .unwrap();

    let writes = h.gw.mutating_calls();
    assert!(!writes.is_empty());
    assert!(writes
        .iter()
        .all(|c| c.is_document_write() && c.target == "rc_snapshots_history"));
    assert!(h.gw.documents("rc_snapshots").is_empty());
}

// =============================================================================
// IDEMPOTENT RE-ENTRY
// =============================================================================

/// Running the same request twice restores each unit once.
#[test]
fn test_second_run_skips_restored_units() {
    let h = Harness::new();
    let a = h.snapshot("a", "2024.01.01", 1, 100);
    let request = RunRequest::new("snapshot_", "2024.01.01").assume_yes();

    h.orchestrator().run(&request).unwrap();
    let second = h.orchestrator().run(&request).unwrap();

    assert!(second.restored_units.is_empty());
    assert_eq!(second.skipped_restored, vec![a]);
    assert_eq!(h.gw.targets_of("restore_snapshot").len(), 1);
}

/// A unit already live without a record is left alone.
#[test]
fn test_live_unit_without_record_is_skipped() {
    let h = Harness::new();
    let a = h.snapshot("a", "2024.01.01", 1, 100);
    h.gw.add_live_unit(&a);

    let result = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap();

    assert_eq!(result.skipped_active, vec![a]);
    assert!(h.gw.mutating_calls().is_empty());
}

/// Resume finishes units this operator left half-done.
#[test]
fn test_resume_finishes_interrupted_units() {
    let h = Harness::new();
    let live = h.snapshot("a", "2024.01.01", 1, 100);
    let queued = h.snapshot("b", "2024.01.01", 1, 100);
    h.gw.add_live_unit(&live);
    h.seed_record(&live, OPERATOR, RestoreStatus::Init);
    h.seed_record(&queued, OPERATOR, RestoreStatus::Init);

    let result = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes().resume())
        .unwrap();

    assert_eq!(result.resumed_units, vec![live.clone()]);
    assert!(result.restored_units.contains(&live));
    assert!(result.restored_units.contains(&queued));
    assert_eq!(
        h.gw.targets_of("restore_snapshot"),
        vec![format!("snapshot_{}", queued)]
    );
    let unit = h.gw.live_unit(&live).unwrap();
    assert_eq!(unit.replicas, 0);
    assert!(!unit.lifecycle_policy);
    assert_eq!(h.store().count_init_records().unwrap(), 0);
}

/// Without resume the operator's own init records still block.
#[test]
fn test_own_records_block_without_resume() {
    let h = Harness::new();
    h.seed_record("a-2024.01.01", OPERATOR, RestoreStatus::Init);

    let err = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreSingleFlight);
}

// =============================================================================
// HEALTH AND CONNECTIVITY
// =============================================================================

/// Work is refused on a cluster that is not green.
#[test]
fn test_unhealthy_cluster_is_refused() {
    let h = Harness::new();
    h.snapshot("a", "2024.01.01", 1, 100);
    h.gw.set_health(HealthColor::Yellow);

    let err = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreClusterUnhealthy);
    assert!(h.gw.mutating_calls().is_empty());
    assert!(h.backend.records().is_empty());
}

/// Health can be waived by configuration.
#[test]
fn test_health_check_can_be_disabled() {
    let mut h = Harness::new();
    h.settings.require_green = false;
    h.snapshot("a", "2024.01.01", 1, 100);
    h.gw.set_health(HealthColor::Yellow);

    let result = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap();

    assert_eq!(result.restored_units.len(), 1);
}

/// A dead endpoint is skipped when another endpoint of the location answers,
/// and restores go through the endpoint that listed the snapshot.
#[test]
fn test_dead_endpoint_is_skipped() {
    let h = Harness::new();
    let second = h.gw.at_endpoint(Endpoint::new("es01", 9201));
    let unit = "a-2024.01.01";
    second.add_snapshot("snapshot_a-2024.01.01", unit, 1, 100);
    h.gw.set_unreachable(&Endpoint::new("es01", 9200));

    let topology = Topology::new().with_location(Location::new(
        "dc1",
        REPOSITORY,
        vec![
            Arc::new(h.gw.clone()) as Arc<dyn ClusterGateway>,
            Arc::new(second.clone()) as Arc<dyn ClusterGateway>,
        ],
    ));

    let result = h
        .orchestrator_for(topology, Arc::new(FixedConfirmer::accept()))
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap();

    assert_eq!(result.restored_units, vec![unit.to_string()]);
    let restore = h
        .gw
        .calls()
        .into_iter()
        .find(|c| c.op == "restore_snapshot")
        .unwrap();
    assert_eq!(restore.endpoint.port, 9201);
}

/// A location with no answering endpoint fails the run.
#[test]
fn test_unreachable_location_fails() {
    let h = Harness::new();
    h.snapshot("a", "2024.01.01", 1, 100);
    h.gw.set_unreachable(&Endpoint::new("es01", 9200));

    let err = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreConnectivity);
    assert!(h.backend.records().is_empty());
}

// =============================================================================
// BATCHING AND STABILITY
// =============================================================================

/// Units are processed in batches of the requested size.
#[test]
fn test_units_are_batched() {
    let h = Harness::new();
    for series in ["a", "b", "c", "d", "e"] {
        h.snapshot(series, "2024.01.01", 1, 100);
    }

    let result = h
        .orchestrator()
        .run(&RunRequest::new("snapshot_", "2024.01.01").with_batch_size(2).assume_yes())
        .unwrap();

    assert_eq!(result.batches, 3);
    assert_eq!(result.restored_units.len(), 5);
    let batches = h.history.actions().iter().filter(|a| *a == "BATCH").count();
    assert_eq!(batches, 3);
}

/// Each batch waits until its units report the best distribution state.
#[test]
fn test_waits_for_stability_after_each_batch() {
    let h = Harness::new();
    let a = h.snapshot("a", "2024.01.01", 1, 100);
    let b = h.snapshot("b", "2024.01.01", 1, 100);
    h.gw.script_distribution(&a, vec![Ok(HealthColor::Red), Ok(HealthColor::Yellow)]);

    let result = h
        .orchestrator()
        .run(
            &RunRequest::new("snapshot_", "2024.01.01")
                .with_batch_size(1)
                .assume_yes()
                .wait_for_stable(None),
        )
        .unwrap();

    assert_eq!(result.stability_waits.len(), 2);
    assert_eq!(h.gw.targets_of("unit_distribution_state"), vec![a.clone(), a.clone(), a, b]);
}

/// A stability ceiling turns an endless wait into an error.
#[test]
fn test_stability_ceiling() {
    let h = Harness::new();
    let a = h.snapshot("a", "2024.01.01", 1, 100);
    h.gw.script_distribution(&a, (0..10_000).map(|_| Ok(HealthColor::Yellow)).collect());

    let err = h
        .orchestrator()
        .run(
            &RunRequest::new("snapshot_", "2024.01.01")
                .assume_yes()
                .wait_for_stable(Some(Duration::from_millis(20))),
        )
        .unwrap_err();

    assert_eq!(err.code(), RunErrorCode::RestoreStabilityTimeout);
    // The unit itself was restored before the wait
    assert_eq!(h.status_of(&a), Some(RestoreStatus::Restored));
}

// =============================================================================
// RECORDS IN THE CLUSTER
// =============================================================================

/// Records written through the index backend carry the expected fields.
#[test]
fn test_records_live_in_the_record_index() {
    let h = Harness::new();
    let a = h.snapshot("a", "2024.01.01", 1, 100);
    let gateway: Arc<dyn ClusterGateway> = Arc::new(h.gw.clone());
    let store = RestoreStateStore::new(Arc::new(IndexRecordBackend::new(Arc::clone(&gateway), "rc_snapshots")), OPERATOR);

    let orchestrator = RestoreOrchestrator::new(
        h.topology(),
        store,
        Arc::new(MemoryHistoryLedger::new()),
        Arc::new(FixedConfirmer::accept()),
        OrchestratorSettings {
            safety_margin: 0.0,
            ..OrchestratorSettings::default()
        },
    );
    orchestrator
        .run(&RunRequest::new("snapshot_", "2024.01.01").assume_yes())
        .unwrap();

    let documents = h.gw.documents("rc_snapshots");
    let record = &documents[&a];
    assert_eq!(record["index_name"], a.as_str());
    assert_eq!(record["osuser"], OPERATOR);
    assert_eq!(record["status"], "restored");
    assert!(record["restore_date"].is_string());
    assert!(record["last_updated"].is_string());
}
