//! Credential resolution order, cancellation and the startup gate

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, env_with, job, FixedAdapterFactory};
use snapvault_core::application::{cancel_channel, CancelToken, Orchestrator, StreamingAdapter};
use snapvault_core::domain::{EngineKind, JobOutcome, JobPhase, JobRequest};
use snapvault_core::port::credentials::mocks::MockCredentialProvisioner;
use snapvault_core::port::engine_client::mocks::MockRelationalApi;
use snapvault_core::port::id_provider::StaticIdProvider;
use snapvault_core::port::time_provider::FixedTimeProvider;
use snapvault_core::port::transfer::mocks::MockTransferGateway;
use snapvault_core::port::{ClientError, Readiness};
use snapvault_core::ErrorKind;
use snapvault_infra_system::FileCredentialProvisioner;

fn write_secret(root: &std::path::Path, rel: &str, value: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, value).unwrap();
}

/// Orchestrator over a file-based provisioner rooted at `secrets`
fn file_backed(
    api: Arc<MockRelationalApi>,
    secrets: &std::path::Path,
    staging: &tempfile::TempDir,
) -> (Orchestrator, Arc<FixedAdapterFactory>) {
    let factory = Arc::new(FixedAdapterFactory::new(Arc::new(StreamingAdapter::new(api))));
    let orchestrator = Orchestrator::new(
        factory.clone(),
        Arc::new(FileCredentialProvisioner::new(secrets)),
        Arc::new(MockTransferGateway::new()),
        config(staging),
        Arc::new(FixedTimeProvider(0)),
        Arc::new(StaticIdProvider("it-creds")),
    );
    (orchestrator, factory)
}

#[tokio::test]
async fn test_missing_cloud_credentials_fail_before_engine() {
    let api = Arc::new(MockRelationalApi::default());
    let e = env_with(
        Arc::new(StreamingAdapter::new(api.clone())),
        MockCredentialProvisioner::new_missing_cloud(),
        Arc::new(MockTransferGateway::new()),
    );

    let report = e
        .orchestrator
        .run(&job("backup", "relational"), CancelToken::never())
        .await;

    assert!(matches!(
        report.outcome,
        JobOutcome::Failed {
            kind: ErrorKind::Credential,
            ..
        }
    ));
    assert_eq!(report.last_phase, JobPhase::Init);
    assert_eq!(e.factory.build_count(), 0);
    assert_eq!(*api.dump_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_file_credentials_feed_the_adapter() {
    let secrets = tempfile::tempdir().unwrap();
    write_secret(secrets.path(), "aws/keyid", "AKIAFILE\n");
    write_secret(secrets.path(), "aws/secret", "file-secret\n");
    write_secret(secrets.path(), "relational/username", "postgres\n");
    write_secret(secrets.path(), "relational/password", "pw\n");
    let staging = tempfile::tempdir().unwrap();
    let api = Arc::new(MockRelationalApi::default());
    let (orchestrator, factory) = file_backed(api.clone(), secrets.path(), &staging);

    let report = orchestrator
        .run(&job("backup", "relational"), CancelToken::never())
        .await;

    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert_eq!(
        *factory.builds.lock().unwrap(),
        vec![(
            EngineKind::Relational,
            "db-0.cluster.local".to_string(),
            "postgres".to_string()
        )]
    );
}

#[tokio::test]
async fn test_inline_credentials_take_precedence() {
    let secrets = tempfile::tempdir().unwrap();
    write_secret(secrets.path(), "relational/username", "from-file");
    write_secret(secrets.path(), "relational/password", "pw");
    let staging = tempfile::tempdir().unwrap();
    let api = Arc::new(MockRelationalApi::default());
    let (orchestrator, factory) = file_backed(api, secrets.path(), &staging);

    // No aws files: the inline pair is the only cloud source
    let job = JobRequest {
        process: Some("backup".into()),
        engine: Some("relational".into()),
        host: Some("pg-0".into()),
        cloud: Some("aws".into()),
        bucket: Some("backups".into()),
        database: Some("prod".into()),
        snapshot: Some("adhoc".into()),
        keyid: Some("AKIAINLINE".into()),
        secret: Some("inline-secret".into()),
        db_user: Some("inline-admin".into()),
        db_password: Some("inline-pw".into()),
        ..Default::default()
    }
    .validate()
    .unwrap();

    let report = orchestrator.run(&job, CancelToken::never()).await;

    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert_eq!(factory.builds.lock().unwrap()[0].2, "inline-admin");
}

#[tokio::test]
async fn test_cancel_before_start_never_reaches_engine() {
    let api = Arc::new(MockRelationalApi::default());
    let e = env_with(
        Arc::new(StreamingAdapter::new(api.clone())),
        MockCredentialProvisioner::new_valid(),
        Arc::new(MockTransferGateway::new()),
    );
    let (handle, cancel) = cancel_channel();
    handle.cancel();

    let report = e.orchestrator.run(&job("backup", "relational"), cancel).await;

    assert_eq!(report.outcome, JobOutcome::Cancelled);
    assert_eq!(report.last_phase, JobPhase::CredentialsReady);
    assert_eq!(*api.dump_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_startup_gate_accepts_a_rejecting_server() {
    let api = Arc::new(MockRelationalApi::default());
    *api.readiness.lock().unwrap() = Ok(Readiness::Rejecting);
    let e = env_with(
        Arc::new(StreamingAdapter::new(api)),
        MockCredentialProvisioner::new_valid(),
        Arc::new(MockTransferGateway::new()),
    );

    let outcome = e
        .orchestrator
        .await_ready(EngineKind::Relational, "pg-0", None, CancelToken::never())
        .await;

    assert_eq!(outcome, JobOutcome::Succeeded);
    assert_eq!(e.credentials.call_count(), 1);
}

#[tokio::test]
async fn test_startup_gate_waits_until_cancelled() {
    let api = Arc::new(MockRelationalApi::default());
    *api.readiness.lock().unwrap() = Err(ClientError::Unreachable("no response".into()));
    let e = env_with(
        Arc::new(StreamingAdapter::new(api)),
        MockCredentialProvisioner::new_valid(),
        Arc::new(MockTransferGateway::new()),
    );

    let (handle, cancel) = cancel_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.cancel();
    });

    let outcome = e
        .orchestrator
        .await_ready(EngineKind::Relational, "pg-0", None, cancel)
        .await;

    assert_eq!(outcome, JobOutcome::Cancelled);
}
