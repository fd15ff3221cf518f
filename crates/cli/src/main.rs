//! Snapvault - backup/restore entry point
//! One job per invocation; the JSON report goes to stdout, logs to stderr

mod args;
mod logging;
mod wiring;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use args::Cli;
use snapvault_core::application::{cancel_channel, CancelHandle, Orchestrator};
use snapvault_core::domain::{DomainError, JobOutcome, JobReport};
use snapvault_core::port::id_provider::UuidProvider;
use snapvault_core::port::time_provider::SystemTimeProvider;
use snapvault_core::{ErrorKind, VERSION};
use snapvault_infra_system::{CliTransferGateway, FileCredentialProvisioner, SubprocessRunner};
use wiring::EngineAdapterFactory;

const EXIT_FAILED: u8 = 1;
const EXIT_INPUT: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init()?;

    info!("Snapvault v{} starting...", VERSION);

    let runner = SubprocessRunner::default();
    let config = cli.orchestrator_config();
    let credentials_dir = cli.credentials_root();
    info!(
        staging_root = %config.staging_root.display(),
        credentials_dir = %credentials_dir,
        "Configuration loaded"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(EngineAdapterFactory::new(
            runner.clone(),
            config.repository.clone(),
        )),
        Arc::new(FileCredentialProvisioner::new(credentials_dir)),
        Arc::new(CliTransferGateway::new(runner)),
        config,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    );

    let (cancel_handle, cancel) = cancel_channel();
    tokio::spawn(cancel_on_signal(cancel_handle));

    let request = cli.job_request();

    if cli.is_startup() {
        let (engine, host) = match request.validate_target() {
            Ok(target) => target,
            Err(e) => return Ok(input_error(&e)),
        };
        let outcome = orchestrator
            .await_ready(engine, &host, cli.inline_engine_credentials(), cancel)
            .await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        print_outcome(&format!("startup {}", engine), &outcome);
        return Ok(ExitCode::from(exit_code(&outcome)));
    }

    let job = match request.validate() {
        Ok(job) => job,
        Err(e) => return Ok(input_error(&e)),
    };

    let report = orchestrator.run(&job, cancel).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    print_summary(&report);

    Ok(ExitCode::from(exit_code(&report.outcome)))
}

/// Ctrl+C or SIGTERM cancels the running job at its next poll boundary
async fn cancel_on_signal(handle: CancelHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("Shutdown signal received. Cancelling job...");
    handle.cancel();
}

fn exit_code(outcome: &JobOutcome) -> u8 {
    match outcome {
        JobOutcome::Succeeded => 0,
        JobOutcome::Cancelled => EXIT_CANCELLED,
        JobOutcome::Failed {
            kind: ErrorKind::Input,
            ..
        } => EXIT_INPUT,
        JobOutcome::Failed { .. } => EXIT_FAILED,
    }
}

fn input_error(err: &DomainError) -> ExitCode {
    error!(error = %err, "Invalid job parameters");
    eprintln!("{} {}", "✗".red().bold(), err);
    ExitCode::from(EXIT_INPUT)
}

fn print_summary(report: &JobReport) {
    let label = format!(
        "{} {} {} ({} units, {} ms)",
        report.process,
        report.engine,
        report.snapshot_id,
        report.units.len(),
        report.duration_ms()
    );
    print_outcome(&label, &report.outcome);
}

fn print_outcome(label: &str, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Succeeded => eprintln!("{} {}", "✓".green().bold(), label),
        JobOutcome::Cancelled => eprintln!("{} {} cancelled", "○".yellow().bold(), label),
        JobOutcome::Failed { kind, reason } => {
            eprintln!("{} {} failed [{}]: {}", "✗".red().bold(), label, kind, reason)
        }
    }
}
