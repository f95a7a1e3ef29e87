//! Read-only inspection of a target database.

use super::session::release;
use super::BackupEngine;
use crate::checkpoint::{CheckpointStore, CHECKPOINT_COLLECTION};
use crate::report::{BackupMode, CollectionOutcome, TargetStatus};
use crate::store::{ClusterConnection, Filter, Namespace};
use crate::Result;

impl BackupEngine {
    /// Document counts per collection of `db` on the target cluster, plus
    /// its incremental checkpoint if one was written.
    pub async fn inspect_target(&self, target_uri: &str, db: &str) -> Result<TargetStatus> {
        let conn = self.connector.connect(target_uri, &self.options).await?;
        let result = inspect(conn.as_ref(), db).await;
        release(conn, "target").await;
        result
    }
}

async fn inspect(conn: &dyn ClusterConnection, db: &str) -> Result<TargetStatus> {
    let mut collections = Vec::new();
    for collection in conn.list_collection_names(db).await? {
        if collection == CHECKPOINT_COLLECTION {
            continue;
        }
        let count = conn.count_documents(&Namespace::new(db, &collection), &Filter::All).await?;
        collections.push(CollectionOutcome { collection, count });
    }
    let last_incremental_at = CheckpointStore::new(conn, db).get(BackupMode::Incremental).await?;
    Ok(TargetStatus {
        db: db.to_string(),
        collections,
        last_incremental_at,
    })
}
