//! Enumerate-and-dump engine through the orchestrator
//!
//! Sequential per-database dumps, first-failure stop, and the
//! manifest carried from backup to restore through the bucket.

mod common;

use std::sync::Arc;

use common::{env, env_with, job};
use snapvault_core::application::{CancelToken, DumpAdapter};
use snapvault_core::domain::{JobOutcome, JobPhase, UnitManifest};
use snapvault_core::port::credentials::mocks::MockCredentialProvisioner;
use snapvault_core::port::engine_client::mocks::MockTimeSeriesApi;
use snapvault_core::port::transfer::mocks::MockTransferGateway;
use snapvault_core::ErrorKind;

#[tokio::test]
async fn test_second_unit_failure_stops_backup() {
    let api = Arc::new(MockTimeSeriesApi::with_databases(&["a", "b", "c"]).fail_unit("b"));
    let e = env(Arc::new(DumpAdapter::new(api.clone())));

    let report = e
        .orchestrator
        .run(&job("backup", "timeseries"), CancelToken::never())
        .await;

    match &report.outcome {
        JobOutcome::Failed { kind, reason } => {
            assert_eq!(*kind, ErrorKind::EngineRejected);
            assert!(reason.contains("dump b"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    // c is never attempted, nothing leaves the host
    assert_eq!(*api.dump_calls.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(e.transfer.push_count(), 0);

    // Partial archive stays on disk without a manifest
    let dir = e.orchestrator.config().backup_dir("nightly-1");
    assert!(dir.join("units/a").exists());
    assert!(UnitManifest::read_from(&dir).await.is_err());
}

#[tokio::test]
async fn test_manifest_round_trip_backup_then_restore() {
    let bucket = Arc::new(MockTransferGateway::new());

    let source = Arc::new(MockTimeSeriesApi::with_databases(&["_internal", "a", "b", "c"]));
    let backup = env_with(
        Arc::new(DumpAdapter::new(source.clone())),
        MockCredentialProvisioner::new_valid(),
        bucket.clone(),
    );
    let report = backup
        .orchestrator
        .run(&job("backup", "timeseries"), CancelToken::never())
        .await;
    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert_eq!(report.units, vec!["a", "b", "c"]);
    assert_eq!(report.last_phase, JobPhase::ArchivePushed);

    // Fresh engine on another host restores from the same bucket
    let target = Arc::new(MockTimeSeriesApi::with_databases(&["_internal"]));
    let restore = env_with(
        Arc::new(DumpAdapter::new(target.clone())),
        MockCredentialProvisioner::new_valid(),
        bucket.clone(),
    );
    let report = restore
        .orchestrator
        .run(&job("restore", "timeseries"), CancelToken::never())
        .await;

    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert_eq!(report.units, vec!["a", "b", "c"]);
    assert_eq!(report.last_phase, JobPhase::HealthGating);
    assert_eq!(*target.restore_calls.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(bucket.pull_count(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["outcome"], "SUCCEEDED");
    assert_eq!(json["last_phase"], "HEALTH_GATING");
    assert_eq!(json["run_id"], "it-run");
}

#[tokio::test]
async fn test_restore_of_missing_archive_never_touches_engine() {
    let api = Arc::new(MockTimeSeriesApi::with_databases(&["a"]));
    let e = env(Arc::new(DumpAdapter::new(api.clone())));

    let report = e
        .orchestrator
        .run(&job("restore", "timeseries"), CancelToken::never())
        .await;

    assert!(matches!(
        report.outcome,
        JobOutcome::Failed {
            kind: ErrorKind::Transfer,
            ..
        }
    ));
    assert_eq!(report.last_phase, JobPhase::CredentialsReady);
    assert!(api.restore_calls.lock().unwrap().is_empty());
}
