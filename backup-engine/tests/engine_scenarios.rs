//! End-to-end scenarios against in-memory clusters.

use backup_engine::store::{MemoryCluster, MemoryConnector};
use backup_engine::{BackupEngine, ClusterPair, ConnectOptions, FixedClock, WeekStamp};
use bson::{doc, Document};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

const SOURCE: &str = "mongodb://source.example:27017";
const TARGET: &str = "mongodb://backup.example:27017";

struct Harness {
    source: MemoryCluster,
    target: MemoryCluster,
    connector: MemoryConnector,
}

impl Harness {
    fn new() -> Self {
        let source = MemoryCluster::new();
        let target = MemoryCluster::new();
        let connector = MemoryConnector::new()
            .with_cluster(SOURCE, source.clone())
            .with_cluster(TARGET, target.clone());
        Self {
            source,
            target,
            connector,
        }
    }

    fn engine_at(&self, now: DateTime<Utc>) -> BackupEngine {
        BackupEngine::new(Arc::new(self.connector.clone()), ConnectOptions::default())
            .with_clock(Arc::new(FixedClock(now)))
    }

    fn pair(&self) -> ClusterPair {
        ClusterPair::new(SOURCE, TARGET)
    }
}

fn stamped(id: i32, at: DateTime<Utc>) -> Document {
    doc! { "_id": id, "updatedAt": bson::DateTime::from_millis(at.timestamp_millis()) }
}

#[tokio::test]
async fn incremental_orders_scenario() {
    let h = Harness::new();
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    h.source
        .seed(
            "shop",
            "orders",
            (1..=3).map(|i| stamped(i, epoch + Duration::days(i as i64 * 3))).collect(),
        )
        .await;

    let started = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    let report = h.engine_at(started).incremental_backup(&h.pair(), "shop", "shop").await.unwrap();
    assert_eq!(report.count_for("orders"), Some(3));
    assert_eq!(report.checkpoint, Some(started));

    let status = h.engine_at(started).inspect_target(TARGET, "shop").await.unwrap();
    assert_eq!(status.last_incremental_at, Some(started));

    // Immediate rerun with no source changes
    let rerun = h
        .engine_at(started + Duration::seconds(30))
        .incremental_backup(&h.pair(), "shop", "shop")
        .await
        .unwrap();
    assert_eq!(rerun.count_for("orders"), Some(0));
    assert_eq!(h.connector.open_connections(), 0);
}

#[tokio::test]
async fn checkpoint_is_monotonic_across_sequential_runs() {
    let h = Harness::new();
    let mut now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut previous = DateTime::<Utc>::UNIX_EPOCH;

    for round in 0..4 {
        h.source.seed("shop", "orders", vec![stamped(round, now - Duration::minutes(1))]).await;
        let report = h.engine_at(now).incremental_backup(&h.pair(), "shop", "shop").await.unwrap();
        let checkpoint = report.checkpoint.unwrap();
        assert!(checkpoint >= previous);
        assert_eq!(report.count_for("orders"), Some(1));
        previous = checkpoint;
        now += Duration::hours(6);
    }
    assert_eq!(h.target.documents("shop", "orders").await.len(), 4);
}

#[tokio::test]
async fn no_mode_deletes_target_documents() {
    let h = Harness::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    h.source.seed("crm", "leads", vec![stamped(1, now - Duration::days(1))]).await;
    h.target
        .seed("crm", "leads", vec![doc! { "_id": 100, "note": "restored by hand" }])
        .await;
    let engine = h.engine_at(now);

    engine.incremental_backup(&h.pair(), "crm", "crm").await.unwrap();
    engine.delta_backup(&h.pair(), "crm", "crm").await.unwrap();

    let docs = h.target.documents("crm", "leads").await;
    assert!(docs.contains(&doc! { "_id": 100, "note": "restored by hand" }));
    assert_eq!(docs.len(), 2);
}

#[tokio::test]
async fn delta_fills_gaps_left_by_untimestamped_documents() {
    let h = Harness::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    h.source
        .seed(
            "crm",
            "leads",
            vec![stamped(1, now - Duration::days(1)), doc! { "_id": 2, "imported": true }],
        )
        .await;
    let engine = h.engine_at(now);

    let incremental = engine.incremental_backup(&h.pair(), "crm", "crm").await.unwrap();
    assert_eq!(incremental.count_for("leads"), Some(1));

    let delta = engine.delta_backup(&h.pair(), "crm", "crm").await.unwrap();
    assert_eq!(delta.count_for("leads"), Some(1));
    assert_eq!(h.target.documents("crm", "leads").await.len(), 2);
}

#[tokio::test]
async fn full_sync_twice_in_one_week_keeps_one_snapshot() {
    let h = Harness::new();
    h.source.seed("sales", "orders", vec![doc! { "_id": 1 }, doc! { "_id": 2 }]).await;
    let monday = Utc.with_ymd_and_hms(2024, 4, 8, 1, 0, 0).unwrap();

    h.engine_at(monday).full_sync(&h.pair(), "sales").await.unwrap();
    h.source.seed("sales", "orders", vec![doc! { "_id": 3 }]).await;
    let report = h
        .engine_at(monday + Duration::days(4))
        .full_sync(&h.pair(), "sales")
        .await
        .unwrap();

    let snapshot = WeekStamp::of(monday).snapshot_name("sales");
    assert_eq!(report.target_db, snapshot);
    assert_eq!(h.target.database_names().await, vec![snapshot.clone()]);
    assert_eq!(h.target.documents(&snapshot, "orders").await.len(), 3);
}

#[tokio::test]
async fn weekly_snapshots_accumulate_then_expire() {
    let h = Harness::new();
    h.source.seed("sales", "orders", vec![doc! { "_id": 1 }]).await;
    let start = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
    let names = vec!["sales".to_string()];

    for week in 0..6 {
        h.engine_at(start + Duration::weeks(week))
            .full_sync_many(&h.pair(), &names, 3)
            .await
            .unwrap();
    }

    let mut remaining: Vec<WeekStamp> = h
        .target
        .database_names()
        .await
        .iter()
        .filter_map(|name| WeekStamp::parse_snapshot_name("sales", name))
        .collect();
    remaining.sort();
    // Weeks 1..=6 of 2024 were written; cutoff at week 3 keeps 3..=6
    assert_eq!(
        remaining,
        (3..=6).map(|w| WeekStamp::new(2024, w)).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn cleanup_retention_window_scenario() {
    let h = Harness::new();
    for week in 1..=30 {
        h.target
            .seed(&format!("sales-week-{}-2023", week), "orders", vec![doc! { "_id": week }])
            .await;
    }
    // Wednesday of ISO week 32, 2023
    let now = Utc.with_ymd_and_hms(2023, 8, 9, 12, 0, 0).unwrap();

    let report = h
        .engine_at(now)
        .cleanup_snapshots(TARGET, &["sales".to_string()], 26)
        .await
        .unwrap();

    assert_eq!(report.cutoff, WeekStamp::new(2023, 6));
    assert_eq!(report.dropped.len(), 5);
    assert_eq!(report.retained.len(), 25);
    for week in 1..=30 {
        let name = format!("sales-week-{}-2023", week);
        let present = h.target.database_names().await.contains(&name);
        assert_eq!(present, week >= 6, "{}", name);
    }
}

#[tokio::test]
async fn retention_compares_year_then_week() {
    let h = Harness::new();
    for name in ["sales-week-53-2020", "sales-week-1-2021", "sales-week-2-2021"] {
        h.target.seed(name, "orders", vec![doc! { "_id": 1 }]).await;
    }
    // Cutoff lands in week 1 of 2021
    let now = Utc.with_ymd_and_hms(2021, 1, 6, 0, 0, 0).unwrap() + Duration::weeks(2);

    let report = h
        .engine_at(now)
        .cleanup_snapshots(TARGET, &["sales".to_string()], 2)
        .await
        .unwrap();

    assert_eq!(report.cutoff, WeekStamp::new(2021, 1));
    assert_eq!(report.dropped, vec!["sales-week-53-2020"]);
}
