//! Batch runs shared by the command line and the scheduler.

use backup_engine::{BackupEngine, BackupMode, BatchReport, ClusterPair, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Run `mode` over `databases`. For full snapshots, `keep_weeks` enables the
/// retention cleanup that follows them; `None` skips it.
pub async fn run_batch(
    engine: &BackupEngine,
    pair: &ClusterPair,
    mode: BackupMode,
    databases: &[String],
    keep_weeks: Option<u32>,
) -> Result<BatchReport> {
    match (mode, keep_weeks) {
        (BackupMode::Incremental, _) => engine.incremental_backup_many(pair, databases).await,
        (BackupMode::Delta, _) => engine.delta_backup_many(pair, databases).await,
        (BackupMode::Full, Some(keep_weeks)) => engine.full_sync_many(pair, databases, keep_weeks).await,
        (BackupMode::Full, None) => {
            let mut runs = Vec::with_capacity(databases.len());
            for db in databases {
                runs.push(engine.full_sync(pair, db).await?);
            }
            Ok(BatchReport {
                mode: BackupMode::Full,
                runs,
                cleanup: None,
            })
        }
    }
}

/// Key identifying a source/target pair for single-flight checks.
pub fn pair_key(pair: &ClusterPair) -> String {
    format!("{} -> {}", pair.source_uri, pair.target_uri)
}

/// Tracks cluster pairs with a run in progress.
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as running. Returns false if it already was.
    pub async fn try_acquire(&self, key: &str) -> bool {
        self.running.lock().await.insert(key.to_string())
    }

    pub async fn release(&self, key: &str) {
        self.running.lock().await.remove(key);
    }

    pub async fn is_running(&self, key: &str) -> bool {
        self.running.lock().await.contains(key)
    }
}
