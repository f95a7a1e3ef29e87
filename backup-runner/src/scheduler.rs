//! Cron-driven backup runs.

use crate::config::{Config, ScheduleConfig};
use crate::jobs::{pair_key, run_batch, RunGuard};
use crate::utils::errors::{Result, RunnerError};
use backup_engine::{BackupEngine, BatchReport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    engine: BackupEngine,
    config: Arc<Config>,
    guard: RunGuard,
}

/// Run one scheduled batch unless another run holds the same cluster pair.
/// Returns `None` when the run was skipped.
pub async fn run_scheduled(
    engine: &BackupEngine,
    config: &Config,
    schedule: &ScheduleConfig,
    guard: &RunGuard,
) -> Result<Option<BatchReport>> {
    let pair = config.cluster_pair();
    let key = pair_key(&pair);
    if !guard.try_acquire(&key).await {
        tracing::warn!(mode = %schedule.mode, "Skipping scheduled run: cluster pair busy");
        return Ok(None);
    }

    let databases = schedule.databases.as_ref().unwrap_or(&config.databases);
    let keep_weeks = schedule.cleanup.then_some(config.retention.keep_weeks);
    let result = run_batch(engine, &pair, schedule.mode, databases, keep_weeks).await;

    // Always release the pair
    guard.release(&key).await;

    Ok(Some(result?))
}

impl BackupScheduler {
    pub async fn new(engine: BackupEngine, config: Arc<Config>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| RunnerError::Scheduler(e.to_string()))?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            engine,
            config,
            guard: RunGuard::new(),
        })
    }

    pub async fn schedule_job(&self, schedule: &ScheduleConfig) -> Result<()> {
        let engine = self.engine.clone();
        let config = self.config.clone();
        let guard = self.guard.clone();
        let entry = schedule.clone();

        let job = Job::new_async(schedule.cron.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            let config = config.clone();
            let guard = guard.clone();
            let entry = entry.clone();
            Box::pin(async move {
                tracing::info!(mode = %entry.mode, "Starting scheduled backup");
                match run_scheduled(&engine, &config, &entry, &guard).await {
                    Ok(Some(batch)) => tracing::info!(
                        mode = %entry.mode,
                        databases = batch.runs.len(),
                        total = batch.total_documents(),
                        "Scheduled backup finished"
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::error!(mode = %entry.mode, error = %e, "Scheduled backup failed"),
                }
            })
        })
        .map_err(|e| RunnerError::Scheduler(format!("invalid cron `{}`: {}", schedule.cron, e)))?;

        self.scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| RunnerError::Scheduler(e.to_string()))?;
        tracing::info!(mode = %schedule.mode, cron = %schedule.cron, "Job scheduled");
        Ok(())
    }

    pub async fn init_schedules(&self) -> Result<usize> {
        let mut count = 0;
        for schedule in &self.config.schedules {
            if let Err(e) = self.schedule_job(schedule).await {
                tracing::error!(mode = %schedule.mode, cron = %schedule.cron, error = %e, "Failed to schedule job");
            } else {
                count += 1;
            }
        }

        tracing::info!(count, "Cron schedules initialized");
        Ok(count)
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(|e| RunnerError::Scheduler(e.to_string()))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| RunnerError::Scheduler(e.to_string()))
    }
}
