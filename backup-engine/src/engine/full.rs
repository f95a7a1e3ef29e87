//! Weekly full snapshots.

use super::session::Session;
use super::{BackupEngine, ClusterPair};
use crate::report::{BackupMode, RunReport};
use crate::store::{Filter, Namespace};
use crate::week::WeekStamp;
use crate::Result;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use tracing::{debug, info};

/// Documents buffered per bulk insert while copying a collection.
pub(crate) const SNAPSHOT_BATCH_SIZE: usize = 1000;

impl BackupEngine {
    /// Copy the whole of `db_name` into `{db_name}-week-{week}-{year}` on the
    /// target, named after the current ISO week.
    ///
    /// Any snapshot already present for this week is dropped first, so a
    /// rerun in the same week replaces it rather than merging into it.
    pub async fn full_sync(&self, pair: &ClusterPair, db_name: &str) -> Result<RunReport> {
        let started_at = self.clock.now();
        let snapshot_db = WeekStamp::of(started_at).snapshot_name(db_name);

        let session = Session::open(self.connector.as_ref(), &self.options, &pair.source_uri, &pair.target_uri).await?;
        let result = self.run_full(&session, db_name, &snapshot_db, started_at).await;
        session.close().await;
        result
    }

    async fn run_full(
        &self,
        session: &Session,
        db_name: &str,
        snapshot_db: &str,
        started_at: DateTime<Utc>,
    ) -> Result<RunReport> {
        let mut report = RunReport::begin(BackupMode::Full, db_name, snapshot_db, started_at);
        info!(db = db_name, snapshot = snapshot_db, "Starting full snapshot");

        session.target.drop_database(snapshot_db).await?;

        for collection in session.source.list_collection_names(db_name).await? {
            let target_ns = Namespace::new(snapshot_db, &collection);
            let mut docs = session
                .source
                .find_stream(&Namespace::new(db_name, &collection), &Filter::All)
                .await?;

            // Empty collections are reported but not created
            let mut count = 0u64;
            let mut batch = Vec::with_capacity(SNAPSHOT_BATCH_SIZE);
            while let Some(doc) = docs.try_next().await? {
                batch.push(doc);
                if batch.len() == SNAPSHOT_BATCH_SIZE {
                    count += session.target.insert_many(&target_ns, std::mem::take(&mut batch)).await?;
                }
            }
            if !batch.is_empty() {
                count += session.target.insert_many(&target_ns, batch).await?;
            }

            debug!(collection = %collection, count, "Collection snapshotted");
            report.record(&collection, count);
        }

        info!(
            db = db_name,
            snapshot = snapshot_db,
            total = report.total_documents,
            "Full snapshot complete"
        );
        Ok(report.finish(self.clock.now()))
    }
}
