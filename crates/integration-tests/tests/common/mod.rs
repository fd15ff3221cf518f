//! Shared harness: real adapter variants over mock wire clients,
//! driven through the orchestrator with millisecond poll policies.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use snapvault_core::application::{Orchestrator, OrchestratorConfig, RetryPolicy};
use snapvault_core::domain::{EngineCredentials, EngineKind, Job, JobRequest};
use snapvault_core::port::credentials::mocks::MockCredentialProvisioner;
use snapvault_core::port::id_provider::StaticIdProvider;
use snapvault_core::port::time_provider::FixedTimeProvider;
use snapvault_core::port::transfer::mocks::MockTransferGateway;
use snapvault_core::port::{AdapterFactory, BackendAdapter};
use snapvault_core::Result;

pub const TICK: Duration = Duration::from_millis(5);

/// Hands out one prebuilt adapter and records when it was asked to
pub struct FixedAdapterFactory {
    adapter: Arc<dyn BackendAdapter>,
    pub builds: Mutex<Vec<(EngineKind, String, String)>>,
}

impl FixedAdapterFactory {
    pub fn new(adapter: Arc<dyn BackendAdapter>) -> Self {
        Self {
            adapter,
            builds: Mutex::new(Vec::new()),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }
}

impl AdapterFactory for FixedAdapterFactory {
    fn build(
        &self,
        engine: EngineKind,
        host: &str,
        credentials: &EngineCredentials,
    ) -> Result<Arc<dyn BackendAdapter>> {
        self.builds.lock().unwrap().push((
            engine,
            host.to_string(),
            credentials.username.clone(),
        ));
        Ok(self.adapter.clone())
    }
}

pub struct Env {
    pub factory: Arc<FixedAdapterFactory>,
    pub credentials: Arc<MockCredentialProvisioner>,
    pub transfer: Arc<MockTransferGateway>,
    pub orchestrator: Orchestrator,
    pub staging: tempfile::TempDir,
}

pub fn config(staging: &tempfile::TempDir) -> OrchestratorConfig {
    OrchestratorConfig {
        completion_poll: RetryPolicy::unbounded(TICK),
        health_poll: RetryPolicy::unbounded(TICK),
        blocking_retry: RetryPolicy::bounded(TICK, TICK * 8),
        ..OrchestratorConfig::default()
    }
    .with_staging_root(staging.path())
}

/// Environment sharing `transfer` so a restore can pull what a backup pushed
pub fn env_with(
    adapter: Arc<dyn BackendAdapter>,
    credentials: MockCredentialProvisioner,
    transfer: Arc<MockTransferGateway>,
) -> Env {
    let staging = tempfile::tempdir().unwrap();
    let factory = Arc::new(FixedAdapterFactory::new(adapter));
    let credentials = Arc::new(credentials);

    let orchestrator = Orchestrator::new(
        factory.clone(),
        credentials.clone(),
        transfer.clone(),
        config(&staging),
        Arc::new(FixedTimeProvider(1_700_000_000_000)),
        Arc::new(StaticIdProvider("it-run")),
    );

    Env {
        factory,
        credentials,
        transfer,
        orchestrator,
        staging,
    }
}

pub fn env(adapter: Arc<dyn BackendAdapter>) -> Env {
    env_with(
        adapter,
        MockCredentialProvisioner::new_valid(),
        Arc::new(MockTransferGateway::new()),
    )
}

pub fn job(process: &str, engine: &str) -> Job {
    JobRequest {
        process: Some(process.into()),
        engine: Some(engine.into()),
        host: Some("db-0.cluster.local".into()),
        cloud: Some("aws".into()),
        bucket: Some("backups".into()),
        database: Some("prod".into()),
        snapshot: Some("nightly-1".into()),
        region: Some("eu-west-1".into()),
        ..Default::default()
    }
    .validate()
    .unwrap()
}
