//! Backup Runner - Main entry point
//!
//! One-shot backup commands and a cron daemon for cross-cluster backups.

use anyhow::Result;
use backup_engine::store::MongoConnector;
use backup_engine::BackupEngine;
use backup_runner::cli::{self, Args, Command};
use backup_runner::config::Config;
use backup_runner::scheduler::BackupScheduler;
use backup_runner::utils;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting backup-runner v{}", env!("CARGO_PKG_VERSION"));

    let engine = BackupEngine::new(Arc::new(MongoConnector), config.connect_options());

    if args.command == Command::Daemon {
        return run_daemon(engine, config).await;
    }

    let report = cli::execute(&args.command, &config, &engine).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_daemon(engine: BackupEngine, config: Config) -> Result<()> {
    let scheduler = BackupScheduler::new(engine, Arc::new(config)).await?;
    let count = scheduler.init_schedules().await?;
    if count == 0 {
        tracing::warn!("No schedules configured; waiting for shutdown signal");
    }
    scheduler.start().await?;

    shutdown_signal().await;

    tracing::info!("Shutting down...");
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    tracing::info!("Runner stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
