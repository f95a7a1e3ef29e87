//! Checkpoint store.
//!
//! Each target database holds one reserved collection with a checkpoint
//! document per backup mode: `{ _id: "<mode>", lastBackupAt: <datetime> }`.
//! Reads and writes are not coordinated: two overlapping runs can read the
//! same checkpoint and the later write wins.

use crate::report::BackupMode;
use crate::store::{ClusterConnection, Filter, Namespace, Projection};
use crate::Result;
use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Reserved collection holding checkpoints. Exists only in target databases.
pub const CHECKPOINT_COLLECTION: &str = "_backup_checkpoints";

/// Field holding the checkpoint timestamp.
pub const LAST_BACKUP_FIELD: &str = "lastBackupAt";

pub struct CheckpointStore<'a> {
    conn: &'a dyn ClusterConnection,
    ns: Namespace,
}

impl<'a> CheckpointStore<'a> {
    pub fn new(conn: &'a dyn ClusterConnection, target_db: &str) -> Self {
        Self {
            conn,
            ns: Namespace::new(target_db, CHECKPOINT_COLLECTION),
        }
    }

    /// Stored checkpoint for `mode`, if one exists.
    pub async fn get(&self, mode: BackupMode) -> Result<Option<DateTime<Utc>>> {
        let filter = Filter::IdEquals(Bson::String(mode.as_str().to_string()));
        let docs = self.conn.find(&self.ns, &filter, Projection::Full).await?;
        let value = docs
            .first()
            .and_then(|doc| doc.get_datetime(LAST_BACKUP_FIELD).ok())
            .and_then(|dt| DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()));
        Ok(value)
    }

    /// Stored checkpoint for `mode`, or the epoch when none has been written.
    pub async fn last_backup_at(&self, mode: BackupMode) -> Result<DateTime<Utc>> {
        Ok(self.get(mode).await?.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Create or overwrite the checkpoint for `mode`.
    pub async fn set(&self, mode: BackupMode, at: DateTime<Utc>) -> Result<()> {
        let record = doc! {
            "_id": mode.as_str(),
            "lastBackupAt": bson::DateTime::from_millis(at.timestamp_millis()),
        };
        self.conn.upsert(&self.ns, record).await?;
        debug!(db = %self.ns.db, mode = %mode, at = %at, "Checkpoint written");
        Ok(())
    }
}
