//! Identity-based delta backup.

use super::session::Session;
use super::{BackupEngine, ClusterPair};
use crate::checkpoint::CHECKPOINT_COLLECTION;
use crate::report::{BackupMode, RunReport};
use crate::store::{Filter, Namespace, Projection};
use crate::Result;
use bson::Bson;
use tracing::{debug, info};

impl BackupEngine {
    /// Insert every source document whose `_id` is missing from the target.
    ///
    /// Documents already present in the target are neither updated nor
    /// deleted. No checkpoint is read or written.
    pub async fn delta_backup(&self, pair: &ClusterPair, source_db: &str, target_db: &str) -> Result<RunReport> {
        let session = Session::open(self.connector.as_ref(), &self.options, &pair.source_uri, &pair.target_uri).await?;
        let result = self.run_delta(&session, source_db, target_db).await;
        session.close().await;
        result
    }

    async fn run_delta(&self, session: &Session, source_db: &str, target_db: &str) -> Result<RunReport> {
        let mut report = RunReport::begin(BackupMode::Delta, source_db, target_db, self.clock.now());
        info!(source_db, target_db, "Starting delta backup");

        for collection in session.source.list_collection_names(source_db).await? {
            if collection == CHECKPOINT_COLLECTION {
                continue;
            }
            let source_ns = Namespace::new(source_db, &collection);
            let target_ns = Namespace::new(target_db, &collection);

            let existing: Vec<Bson> = session
                .target
                .find(&target_ns, &Filter::All, Projection::IdOnly)
                .await?
                .into_iter()
                .filter_map(|mut doc| doc.remove("_id"))
                .collect();
            let existing_count = existing.len();

            let missing = session
                .source
                .find(&source_ns, &Filter::IdNotIn(existing), Projection::Full)
                .await?;
            let count = session.target.insert_many(&target_ns, missing).await?;

            debug!(collection = %collection, existing = existing_count, inserted = count, "Collection delta applied");
            report.record(&collection, count);
        }

        info!(source_db, target_db, total = report.total_documents, "Delta backup complete");
        Ok(report.finish(self.clock.now()))
    }
}
