//! Orchestrator
//!
//! Drives one job through its backup or restore state machine. Adapter,
//! credential and transfer collaborators come in as ports; every polling call
//! site takes its policy from [`OrchestratorConfig`].
//!
//! `run` never returns an error: whatever happens ends up as a
//! [`JobOutcome`] inside the [`JobReport`].

mod backup;
mod restore;
mod run;

use crate::application::config::OrchestratorConfig;
use crate::application::poll::{poll_until, retry_until, Attempt, CancelToken, Probe};
use crate::domain::{
    repository_base_path, CloudCredentials, EngineCredentials, EngineKind, HealthRequirement, Job,
    JobOutcome, JobPhase, JobReport, OperationResult, Process, RepositoryTarget,
    ResolvedCredentials, SnapshotStatus, UnitManifest, Unreachable,
};
use crate::error::{AppError, Result};
use crate::port::{
    AdapterFactory, BackendAdapter, CompletionMode, CredentialProvisioner, IdProvider, Operation,
    TimeProvider, TransferGateway,
};
use run::Run;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

pub struct Orchestrator {
    adapters: Arc<dyn AdapterFactory>,
    credentials: Arc<dyn CredentialProvisioner>,
    transfer: Arc<dyn TransferGateway>,
    config: OrchestratorConfig,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl Orchestrator {
    pub fn new(
        adapters: Arc<dyn AdapterFactory>,
        credentials: Arc<dyn CredentialProvisioner>,
        transfer: Arc<dyn TransferGateway>,
        config: OrchestratorConfig,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            adapters,
            credentials,
            transfer,
            config,
            time_provider,
            id_provider,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one job to a terminal state
    pub async fn run(&self, job: &Job, cancel: CancelToken) -> JobReport {
        let run_id = self.id_provider.generate_id();
        let started_at = self.time_provider.now_millis();
        let span = info_span!(
            "job",
            run_id = %run_id,
            process = %job.process(),
            engine = %job.engine(),
            snapshot = %job.snapshot_id()
        );

        let mut run = Run::new(job, &cancel);
        let result = self.execute(&mut run).instrument(span.clone()).await;

        let outcome = span.in_scope(|| match result {
            Ok(()) => {
                run.phases.finish(JobPhase::Succeeded);
                info!(units = run.units.len(), "Job succeeded");
                JobOutcome::Succeeded
            }
            Err(AppError::Cancelled) => {
                run.phases.finish(JobPhase::Cancelled);
                if run.engine_work_started() {
                    warn!(
                        last_phase = %run.phases.last_active(),
                        "Job cancelled after the engine operation started; engine-side work is not reversed"
                    );
                } else {
                    info!(last_phase = %run.phases.last_active(), "Job cancelled");
                }
                JobOutcome::Cancelled
            }
            Err(err) => {
                run.phases.finish(JobPhase::Failed);
                error!(
                    kind = %err.kind(),
                    last_phase = %run.phases.last_active(),
                    error = %err,
                    "Job failed"
                );
                JobOutcome::from(err)
            }
        });

        JobReport {
            run_id,
            process: job.process(),
            engine: job.engine(),
            snapshot_id: job.snapshot_id().to_string(),
            outcome,
            last_phase: run.phases.last_active(),
            units: run.units,
            started_at,
            finished_at: self.time_provider.now_millis(),
        }
    }

    /// Startup gate: wait until the engine is serving requests
    pub async fn await_ready(
        &self,
        engine: EngineKind,
        host: &str,
        credentials: Option<EngineCredentials>,
        cancel: CancelToken,
    ) -> JobOutcome {
        match self.probe_ready(engine, host, credentials, &cancel).await {
            Ok(()) => {
                info!(engine = %engine, host = %host, "Engine is serving");
                JobOutcome::Succeeded
            }
            Err(err) => {
                warn!(engine = %engine, host = %host, error = %err, "Startup gate ended without a serving engine");
                JobOutcome::from(err)
            }
        }
    }

    async fn probe_ready(
        &self,
        engine: EngineKind,
        host: &str,
        credentials: Option<EngineCredentials>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let credentials = match credentials {
            Some(credentials) => credentials,
            None => self.credentials.resolve_engine_credentials(engine).await?,
        };
        let adapter = self.adapters.build(engine, host, &credentials)?;
        self.wait_for_health(adapter.as_ref(), HealthRequirement::Serving, cancel)
            .await
    }

    async fn execute(&self, run: &mut Run<'_>) -> Result<()> {
        match run.job.process() {
            Process::Backup => self.backup(run).await,
            Process::Restore => self.restore(run).await,
        }
    }

    /// Inline job credentials first, then the provisioner
    async fn resolve_credentials(&self, job: &Job) -> Result<ResolvedCredentials> {
        let inline = job.credentials();
        let cloud = match &inline.cloud {
            Some(cloud) => cloud.clone(),
            None => {
                self.credentials
                    .resolve_cloud_credentials(job.cloud())
                    .await?
            }
        };
        let engine = match &inline.engine {
            Some(engine) => engine.clone(),
            None => {
                self.credentials
                    .resolve_engine_credentials(job.engine())
                    .await?
            }
        };
        debug!(
            inline_cloud = inline.cloud.is_some(),
            inline_engine = inline.engine.is_some(),
            "Credentials resolved"
        );
        Ok(ResolvedCredentials { cloud, engine })
    }

    /// Snapshot-capable engines write into the bucket; the rest into `dir`
    fn target_for(&self, job: &Job, cloud: &CloudCredentials, dir: &Path) -> RepositoryTarget {
        match job.engine() {
            EngineKind::Search => RepositoryTarget::ObjectStore {
                repository: self.config.repository.clone(),
                provider: job.cloud(),
                bucket: job.bucket().to_string(),
                base_path: repository_base_path(job.namespace()),
                region: job.region().map(str::to_string),
                credentials: cloud.clone(),
                settings: self.config.repository_settings.clone(),
            },
            EngineKind::TimeSeries | EngineKind::Relational => RepositoryTarget::Staging {
                dir: dir.to_path_buf(),
            },
        }
    }

    async fn setup_target(
        &self,
        run: &mut Run<'_>,
        adapter: &dyn BackendAdapter,
        target: &RepositoryTarget,
    ) -> Result<()> {
        run.checkpoint()?;
        match adapter.setup_target(target).await {
            OperationResult::Accepted | OperationResult::AlreadyInProgress => {
                info!(repository = ?target.repository_name(), "Target ready");
                run.advance(JobPhase::TargetReady)
            }
            OperationResult::Rejected(reason) => Err(AppError::EngineRejected(reason)),
            OperationResult::EngineUnreachable(reason) => Err(AppError::EngineUnreachable(reason)),
        }
    }

    /// Issue the single start call and wait for a terminal state
    ///
    /// Polled engines get one start call followed by a completion poll. Blocking
    /// engines have nothing to poll, so the start call itself is retried under
    /// the bounded policy.
    async fn start_operation(
        &self,
        run: &mut Run<'_>,
        adapter: &dyn BackendAdapter,
        operation: Operation<'_>,
    ) -> Result<()> {
        run.checkpoint()?;
        let label = operation_label(operation);

        match adapter.completion() {
            CompletionMode::Polled => {
                match start(adapter, operation).await {
                    OperationResult::Accepted => {}
                    OperationResult::AlreadyInProgress => {
                        info!(label, "Operation already in progress, following it")
                    }
                    OperationResult::Rejected(reason) => {
                        return Err(AppError::EngineRejected(reason))
                    }
                    OperationResult::EngineUnreachable(reason) => {
                        return Err(AppError::EngineUnreachable(reason))
                    }
                }
                run.advance(JobPhase::OperationStarted)?;
                run.advance(JobPhase::Polling)?;
                self.await_completion(adapter, operation, run.cancel).await
            }
            CompletionMode::Blocking => {
                run.advance(JobPhase::OperationStarted)?;
                retry_until(label, &self.config.blocking_retry, run.cancel, move || async move {
                    match start(adapter, operation).await {
                        OperationResult::Accepted => Ok(()),
                        OperationResult::AlreadyInProgress => {
                            Err(Attempt::Retry("operation already in progress".to_string()))
                        }
                        OperationResult::EngineUnreachable(reason) => Err(Attempt::Retry(reason)),
                        OperationResult::Rejected(reason) => {
                            Err(Attempt::Abort(AppError::EngineRejected(reason)))
                        }
                    }
                })
                .await
            }
        }
    }

    async fn await_completion(
        &self,
        adapter: &dyn BackendAdapter,
        operation: Operation<'_>,
        cancel: &CancelToken,
    ) -> Result<()> {
        poll_until(
            operation_label(operation),
            &self.config.completion_poll,
            cancel,
            move || async move {
                match adapter.check_snapshot_status(operation).await {
                    Ok(SnapshotStatus::Succeeded) => Ok(Probe::Ready(())),
                    Ok(SnapshotStatus::InProgress) => Ok(Probe::Pending("in progress".to_string())),
                    Ok(SnapshotStatus::Failed(reason)) => Err(AppError::EngineRejected(reason)),
                    Err(Unreachable(reason)) => Ok(Probe::Pending(format!("unreachable: {}", reason))),
                }
            },
        )
        .await
    }

    async fn wait_for_health(
        &self,
        adapter: &dyn BackendAdapter,
        requirement: HealthRequirement,
        cancel: &CancelToken,
    ) -> Result<()> {
        poll_until("health", &self.config.health_poll, cancel, move || async move {
            match adapter.check_health().await {
                Ok(status) if requirement.is_met_by(status) => Ok(Probe::Ready(())),
                Ok(status) => Ok(Probe::Pending(format!("health {}", status))),
                Err(Unreachable(reason)) => Ok(Probe::Pending(format!("unreachable: {}", reason))),
            }
        })
        .await
    }
}

async fn start(adapter: &dyn BackendAdapter, operation: Operation<'_>) -> OperationResult {
    match operation {
        Operation::Backup(archive) => adapter.start_backup(archive).await,
        Operation::Restore(archive, manifest) => adapter.start_restore(archive, manifest).await,
    }
}

fn operation_label(operation: Operation<'_>) -> &'static str {
    match operation {
        Operation::Backup(_) => "backup",
        Operation::Restore(..) => "restore",
    }
}

/// Remove and re-create a per-snapshot staging directory
async fn reset_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed stale staging dir"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

async fn read_manifest(dir: &Path) -> Result<UnitManifest> {
    UnitManifest::read_from(dir).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::Archive(format!(
                "no manifest in {}; archive is incomplete",
                dir.display()
            ))
        } else {
            AppError::Archive(format!("cannot read manifest in {}: {}", dir.display(), e))
        }
    })
}
