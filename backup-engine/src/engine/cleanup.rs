//! Retention cleanup of weekly snapshot databases.

use super::session::release;
use super::BackupEngine;
use crate::report::CleanupReport;
use crate::store::ClusterConnection;
use crate::week::WeekStamp;
use crate::Result;
use std::collections::HashSet;
use tracing::{info, warn};

impl BackupEngine {
    /// Drop every snapshot of `base_names` on the target cluster whose week
    /// is strictly before the week `keep_weeks` weeks ago.
    ///
    /// Names under a base's `-week-` prefix with an unparseable suffix are
    /// skipped, never dropped.
    pub async fn cleanup_snapshots(
        &self,
        target_uri: &str,
        base_names: &[String],
        keep_weeks: u32,
    ) -> Result<CleanupReport> {
        let conn = self.connector.connect(target_uri, &self.options).await?;
        let result = self.run_cleanup(conn.as_ref(), base_names, keep_weeks).await;
        release(conn, "target").await;
        result
    }

    async fn run_cleanup(
        &self,
        conn: &dyn ClusterConnection,
        base_names: &[String],
        keep_weeks: u32,
    ) -> Result<CleanupReport> {
        let databases = conn.list_database_names().await?;
        let cutoff = WeekStamp::retention_cutoff(self.clock.now(), keep_weeks);
        info!(keep_weeks, cutoff = %cutoff, "Starting snapshot cleanup");

        let mut report = CleanupReport {
            keep_weeks,
            cutoff,
            dropped: Vec::new(),
            retained: Vec::new(),
            skipped: Vec::new(),
        };
        let mut seen: HashSet<&str> = HashSet::new();

        for base in base_names {
            let prefix = WeekStamp::snapshot_prefix(base);
            for name in databases.iter().filter(|name| name.starts_with(&prefix)) {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                match WeekStamp::parse_snapshot_name(base, name) {
                    None => {
                        warn!(db = %name, "Skipping database with malformed snapshot suffix");
                        report.skipped.push(name.clone());
                    }
                    Some(stamp) if stamp < cutoff => {
                        conn.drop_database(name).await?;
                        info!(db = %name, week = %stamp, "Dropped expired snapshot");
                        report.dropped.push(name.clone());
                    }
                    Some(_) => report.retained.push(name.clone()),
                }
            }
        }

        info!(
            dropped = report.dropped.len(),
            retained = report.retained.len(),
            skipped = report.skipped.len(),
            "Snapshot cleanup complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{ConnectOptions, MemoryCluster, MemoryConnector};
    use bson::doc;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const TARGET: &str = "memory://target";

    async fn cluster_with(names: &[&str]) -> MemoryCluster {
        let cluster = MemoryCluster::new();
        for name in names {
            cluster.seed(name, "orders", vec![doc! { "_id": 1 }]).await;
        }
        cluster
    }

    fn engine(cluster: &MemoryCluster) -> (BackupEngine, MemoryConnector) {
        let connector = MemoryConnector::new().with_cluster(TARGET, cluster.clone());
        // Wednesday of ISO week 32, 2023
        let now = Utc.with_ymd_and_hms(2023, 8, 9, 0, 0, 0).unwrap();
        let engine = BackupEngine::new(Arc::new(connector.clone()), ConnectOptions::default())
            .with_clock(Arc::new(FixedClock(now)));
        (engine, connector)
    }

    #[tokio::test]
    async fn test_drops_only_snapshots_before_cutoff() {
        let cluster = cluster_with(&[
            "sales-week-52-2022",
            "sales-week-5-2023",
            "sales-week-6-2023",
            "sales-week-31-2023",
            "sales",
        ])
        .await;
        let (engine, connector) = engine(&cluster);

        let report = engine
            .cleanup_snapshots(TARGET, &["sales".to_string()], 26)
            .await
            .unwrap();

        assert_eq!(report.cutoff, WeekStamp::new(2023, 6));
        assert_eq!(report.dropped, vec!["sales-week-5-2023", "sales-week-52-2022"]);
        assert_eq!(report.retained, vec!["sales-week-31-2023", "sales-week-6-2023"]);
        assert_eq!(
            cluster.database_names().await,
            vec!["sales", "sales-week-31-2023", "sales-week-6-2023"]
        );
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_malformed_names_are_skipped() {
        let cluster = cluster_with(&["sales-week-x-2001", "sales-week-3-2001-copy", "sales-week-3-2001"]).await;
        let (engine, _) = engine(&cluster);

        let report = engine
            .cleanup_snapshots(TARGET, &["sales".to_string()], 26)
            .await
            .unwrap();

        assert_eq!(report.dropped, vec!["sales-week-3-2001"]);
        assert_eq!(report.skipped.len(), 2);
        assert!(cluster.database_names().await.contains(&"sales-week-x-2001".to_string()));
    }

    #[tokio::test]
    async fn test_other_bases_untouched() {
        let cluster = cluster_with(&["sales-week-1-2020", "inventory-week-1-2020"]).await;
        let (engine, _) = engine(&cluster);

        engine
            .cleanup_snapshots(TARGET, &["sales".to_string()], 26)
            .await
            .unwrap();

        assert_eq!(cluster.database_names().await, vec!["inventory-week-1-2020"]);
    }

    #[tokio::test]
    async fn test_window_beyond_calendar_keeps_everything() {
        let cluster = cluster_with(&["sales-week-1-1970", "sales-week-31-2023"]).await;
        let (engine, connector) = engine(&cluster);

        let report = engine
            .cleanup_snapshots(TARGET, &["sales".to_string()], 20_000_000)
            .await
            .unwrap();

        assert!(report.dropped.is_empty());
        assert_eq!(report.retained.len(), 2);
        assert_eq!(cluster.database_names().await.len(), 2);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_fatal() {
        let connector = MemoryConnector::new();
        let engine = BackupEngine::new(Arc::new(connector), ConnectOptions::default());

        let err = engine
            .cleanup_snapshots("memory://gone", &["sales".to_string()], 26)
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }
}
