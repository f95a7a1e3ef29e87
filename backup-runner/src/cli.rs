//! Command-line surface.

use crate::config::Config;
use crate::jobs::run_batch;
use anyhow::{bail, Result};
use backup_engine::{BackupEngine, BackupMode, BatchReport};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Copy documents modified since the last checkpoint
    Incremental(CopyArgs),

    /// Copy documents missing from the target
    Delta(CopyArgs),

    /// Take this week's snapshot of each database, then expire old ones
    Full {
        /// Database to snapshot (repeatable; defaults to the configured list)
        #[arg(long = "db", value_name = "NAME")]
        databases: Vec<String>,

        /// Retention window in weeks (overrides config)
        #[arg(long)]
        keep_weeks: Option<u32>,

        /// Do not drop expired snapshots afterwards
        #[arg(long)]
        skip_cleanup: bool,
    },

    /// Drop expired weekly snapshots on the target cluster
    Cleanup {
        /// Base database name (repeatable; defaults to the configured list)
        #[arg(long = "base", value_name = "NAME")]
        bases: Vec<String>,

        /// Retention window in weeks (overrides config)
        #[arg(long)]
        keep_weeks: Option<u32>,
    },

    /// Show document counts and checkpoint of a target database
    Status {
        #[arg(long, value_name = "NAME")]
        db: String,
    },

    /// Run the configured schedules until interrupted
    Daemon,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct CopyArgs {
    /// Source database (repeatable; defaults to the configured list)
    #[arg(long = "db", value_name = "NAME")]
    pub databases: Vec<String>,

    /// Target database name, when it differs from the single source database
    #[arg(long, value_name = "NAME")]
    pub target_db: Option<String>,
}

fn databases_or_configured(given: &[String], config: &Config) -> Result<Vec<String>> {
    let databases = if given.is_empty() {
        config.databases.clone()
    } else {
        given.to_vec()
    };
    if databases.is_empty() {
        bail!("no databases given: pass --db or set `databases` in the configuration");
    }
    Ok(databases)
}

fn keep_weeks_or_configured(given: Option<u32>, config: &Config) -> Result<u32> {
    let keep_weeks = given.unwrap_or(config.retention.keep_weeks);
    if keep_weeks == 0 {
        bail!("--keep-weeks must be at least 1");
    }
    Ok(keep_weeks)
}

async fn copy(engine: &BackupEngine, config: &Config, mode: BackupMode, args: &CopyArgs) -> Result<Value> {
    let pair = config.cluster_pair();
    let databases = databases_or_configured(&args.databases, config)?;

    if let Some(target_db) = &args.target_db {
        if databases.len() != 1 {
            bail!("--target-db needs exactly one --db");
        }
        let report = match mode {
            BackupMode::Incremental => engine.incremental_backup(&pair, &databases[0], target_db).await?,
            _ => engine.delta_backup(&pair, &databases[0], target_db).await?,
        };
        return Ok(serde_json::to_value(report)?);
    }

    let batch: BatchReport = run_batch(engine, &pair, mode, &databases, None).await?;
    Ok(serde_json::to_value(batch)?)
}

/// Run a one-shot command and return its report as JSON.
pub async fn execute(command: &Command, config: &Config, engine: &BackupEngine) -> Result<Value> {
    match command {
        Command::Incremental(args) => copy(engine, config, BackupMode::Incremental, args).await,
        Command::Delta(args) => copy(engine, config, BackupMode::Delta, args).await,
        Command::Full {
            databases,
            keep_weeks,
            skip_cleanup,
        } => {
            let databases = databases_or_configured(databases, config)?;
            let keep_weeks = if *skip_cleanup {
                None
            } else {
                Some(keep_weeks_or_configured(*keep_weeks, config)?)
            };
            let batch = run_batch(engine, &config.cluster_pair(), BackupMode::Full, &databases, keep_weeks).await?;
            Ok(serde_json::to_value(batch)?)
        }
        Command::Cleanup { bases, keep_weeks } => {
            let bases = databases_or_configured(bases, config)?;
            let keep_weeks = keep_weeks_or_configured(*keep_weeks, config)?;
            let report = engine.cleanup_snapshots(&config.target.uri, &bases, keep_weeks).await?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Status { db } => {
            let status = engine.inspect_target(&config.target.uri, db).await?;
            Ok(serde_json::to_value(status)?)
        }
        Command::Daemon => bail!("daemon is not a one-shot command"),
    }
}
