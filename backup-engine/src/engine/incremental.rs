//! Timestamp-based incremental backup.

use super::session::Session;
use super::{BackupEngine, ClusterPair, UPDATED_AT_FIELD};
use crate::checkpoint::{CheckpointStore, CHECKPOINT_COLLECTION};
use crate::clock::truncate_to_millis;
use crate::report::{BackupMode, RunReport};
use crate::store::{Filter, Namespace, Projection};
use crate::Result;
use tracing::{debug, info};

impl BackupEngine {
    /// Upsert every source document whose `updatedAt` is strictly after the
    /// stored checkpoint, then move the checkpoint to the run's start time.
    ///
    /// Never deletes from the target. If any write fails the checkpoint is
    /// left untouched, so the next run redoes the work.
    pub async fn incremental_backup(&self, pair: &ClusterPair, source_db: &str, target_db: &str) -> Result<RunReport> {
        let session = Session::open(self.connector.as_ref(), &self.options, &pair.source_uri, &pair.target_uri).await?;
        let result = self.run_incremental(&session, source_db, target_db).await;
        session.close().await;
        result
    }

    async fn run_incremental(&self, session: &Session, source_db: &str, target_db: &str) -> Result<RunReport> {
        let checkpoints = CheckpointStore::new(session.target.as_ref(), target_db);
        let last_backup_at = checkpoints.last_backup_at(BackupMode::Incremental).await?;

        // Captured before copying so writes racing the copy are picked up next run
        let now = truncate_to_millis(self.clock.now());
        let mut report = RunReport::begin(BackupMode::Incremental, source_db, target_db, now);

        info!(source_db, target_db, since = %last_backup_at, "Starting incremental backup");

        let filter = Filter::UpdatedAfter {
            field: UPDATED_AT_FIELD.to_string(),
            after: last_backup_at,
        };

        for collection in session.source.list_collection_names(source_db).await? {
            if collection == CHECKPOINT_COLLECTION {
                continue;
            }
            let source_ns = Namespace::new(source_db, &collection);
            let target_ns = Namespace::new(target_db, &collection);

            let changed = session.source.find(&source_ns, &filter, Projection::Full).await?;
            let mut count = 0u64;
            for doc in changed {
                session.target.upsert(&target_ns, doc).await?;
                count += 1;
            }

            debug!(collection = %collection, count, "Collection upserted");
            report.record(&collection, count);
        }

        checkpoints.set(BackupMode::Incremental, now).await?;
        report.checkpoint = Some(now);

        info!(
            source_db,
            target_db,
            total = report.total_documents,
            checkpoint = %now,
            "Incremental backup complete"
        );
        Ok(report.finish(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{ConnectOptions, MemoryCluster, MemoryConnector};
    use bson::{doc, Document};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    const SOURCE: &str = "memory://source";
    const TARGET: &str = "memory://target";

    fn bson_time(at: DateTime<Utc>) -> bson::DateTime {
        bson::DateTime::from_millis(at.timestamp_millis())
    }

    fn order(id: i32, updated_at: DateTime<Utc>) -> Document {
        doc! { "_id": id, "total": id * 10, "updatedAt": bson_time(updated_at) }
    }

    fn engine_at(now: DateTime<Utc>, source: &MemoryCluster, target: &MemoryCluster) -> (BackupEngine, MemoryConnector) {
        let connector = MemoryConnector::new()
            .with_cluster(SOURCE, source.clone())
            .with_cluster(TARGET, target.clone());
        let engine = BackupEngine::new(Arc::new(connector.clone()), ConnectOptions::default())
            .with_clock(Arc::new(FixedClock(now)));
        (engine, connector)
    }

    fn pair() -> ClusterPair {
        ClusterPair::new(SOURCE, TARGET)
    }

    #[tokio::test]
    async fn test_first_run_copies_everything_after_epoch() {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source
            .seed(
                "shop",
                "orders",
                vec![
                    order(1, epoch + Duration::days(1)),
                    order(2, epoch + Duration::days(5)),
                    order(3, epoch + Duration::days(9)),
                ],
            )
            .await;
        let (engine, connector) = engine_at(now, &source, &target);

        let report = engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        assert_eq!(report.count_for("orders"), Some(3));
        assert_eq!(report.checkpoint, Some(now));
        assert_eq!(target.documents("shop", "orders").await.len(), 3);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_only_documents_after_checkpoint_are_copied() {
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let t2 = t1 + Duration::days(1);
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source.seed("shop", "orders", vec![order(1, t1 - Duration::hours(1))]).await;

        let (engine, _) = engine_at(t1, &source, &target);
        engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        // One stale edit, one new document, one edit exactly at the checkpoint
        source
            .seed(
                "shop",
                "orders",
                vec![order(2, t1 + Duration::minutes(5)), order(3, t1)],
            )
            .await;

        let (engine, _) = engine_at(t2, &source, &target);
        let report = engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        assert_eq!(report.count_for("orders"), Some(1));
        let ids: Vec<i32> = target
            .documents("shop", "orders")
            .await
            .iter()
            .map(|d| d.get_i32("_id").unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_upsert_updates_and_never_deletes() {
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source
            .seed("shop", "orders", vec![doc! { "_id": 1, "total": 99, "updatedAt": bson_time(t1) }])
            .await;
        target
            .seed(
                "shop",
                "orders",
                vec![
                    doc! { "_id": 1, "total": 10 },
                    doc! { "_id": 42, "total": 420 },
                ],
            )
            .await;

        let (engine, _) = engine_at(t1 + Duration::hours(1), &source, &target);
        engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        let docs = target.documents("shop", "orders").await;
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.get_i32("_id").ok() == Some(1) && d.get_i32("total").ok() == Some(99)));
        assert!(docs.iter().any(|d| d.get_i32("_id").ok() == Some(42)));
    }

    #[tokio::test]
    async fn test_unchanged_collections_report_zero() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source.create_collection("shop", "customers").await;
        source.seed("shop", "legacy", vec![doc! { "_id": 1, "name": "no timestamp" }]).await;

        let (engine, _) = engine_at(now, &source, &target);
        let report = engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        assert_eq!(report.count_for("customers"), Some(0));
        assert_eq!(report.count_for("legacy"), Some(0));
        assert_eq!(report.total_documents, 0);
    }

    #[tokio::test]
    async fn test_checkpoint_collection_in_source_is_not_copied() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source
            .seed(
                "shop",
                CHECKPOINT_COLLECTION,
                vec![doc! { "_id": "incremental", "updatedAt": bson_time(now - Duration::days(1)) }],
            )
            .await;

        let (engine, _) = engine_at(now, &source, &target);
        let report = engine.incremental_backup(&pair(), "shop", "shop").await.unwrap();

        assert_eq!(report.count_for(CHECKPOINT_COLLECTION), None);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_checkpoint_and_closes_connections() {
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        source.seed("shop", "orders", vec![order(1, t1 - Duration::hours(1))]).await;
        target.fail_writes_to("orders").await;

        let (engine, connector) = engine_at(t1, &source, &target);
        let result = engine.incremental_backup(&pair(), "shop", "shop").await;

        assert!(result.is_err());
        assert!(target.documents("shop", CHECKPOINT_COLLECTION).await.is_empty());
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_releases_source() {
        let source = MemoryCluster::new();
        let connector = MemoryConnector::new().with_cluster(SOURCE, source);
        let engine = BackupEngine::new(Arc::new(connector.clone()), ConnectOptions::default());

        let err = engine
            .incremental_backup(&ClusterPair::new(SOURCE, "memory://gone"), "shop", "shop")
            .await
            .unwrap_err();

        assert!(err.is_connection());
        assert_eq!(connector.open_connections(), 0);
    }
}
