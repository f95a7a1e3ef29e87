//! Multi-database runs.
//!
//! Each variant runs the single-database engine once per name, in list
//! order, against the same cluster pair. The first failure ends the batch.

use super::{BackupEngine, ClusterPair};
use crate::report::{BackupMode, BatchReport};
use crate::Result;
use tracing::info;

impl BackupEngine {
    /// Incremental backup of each database into the same-named target database.
    pub async fn incremental_backup_many(&self, pair: &ClusterPair, db_names: &[String]) -> Result<BatchReport> {
        let mut batch = BatchReport {
            mode: BackupMode::Incremental,
            runs: Vec::with_capacity(db_names.len()),
            cleanup: None,
        };
        for db in db_names {
            batch.runs.push(self.incremental_backup(pair, db, db).await?);
        }
        info!(databases = db_names.len(), total = batch.total_documents(), "Incremental batch complete");
        Ok(batch)
    }

    /// Delta backup of each database into the same-named target database.
    pub async fn delta_backup_many(&self, pair: &ClusterPair, db_names: &[String]) -> Result<BatchReport> {
        let mut batch = BatchReport {
            mode: BackupMode::Delta,
            runs: Vec::with_capacity(db_names.len()),
            cleanup: None,
        };
        for db in db_names {
            batch.runs.push(self.delta_backup(pair, db, db).await?);
        }
        info!(databases = db_names.len(), total = batch.total_documents(), "Delta batch complete");
        Ok(batch)
    }

    /// Snapshot every database, then expire old snapshots of the same bases
    /// on the target cluster.
    pub async fn full_sync_many(&self, pair: &ClusterPair, db_names: &[String], keep_weeks: u32) -> Result<BatchReport> {
        let mut batch = BatchReport {
            mode: BackupMode::Full,
            runs: Vec::with_capacity(db_names.len()),
            cleanup: None,
        };
        for db in db_names {
            batch.runs.push(self.full_sync(pair, db).await?);
        }
        batch.cleanup = Some(self.cleanup_snapshots(&pair.target_uri, db_names, keep_weeks).await?);
        info!(databases = db_names.len(), total = batch.total_documents(), "Full snapshot batch complete");
        Ok(batch)
    }
}
