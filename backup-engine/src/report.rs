//! Run reports returned by the engines.

use crate::week::WeekStamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Copy documents modified since the last checkpoint.
    Incremental,
    /// Copy documents whose identity is missing from the target.
    Delta,
    /// Copy everything into a week-stamped snapshot database.
    Full,
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupMode::Incremental => "incremental",
            BackupMode::Delta => "delta",
            BackupMode::Full => "full",
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(BackupMode::Incremental),
            "delta" => Ok(BackupMode::Delta),
            "full" => Ok(BackupMode::Full),
            other => Err(format!("unknown backup mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub count: u64,
}

/// Outcome of one engine invocation against one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: BackupMode,
    pub source_db: String,
    pub target_db: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-collection counts in processing order.
    pub collections: Vec<CollectionOutcome>,
    pub total_documents: u64,
    /// Checkpoint written by an incremental run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn begin(mode: BackupMode, source_db: &str, target_db: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            source_db: source_db.to_string(),
            target_db: target_db.to_string(),
            started_at,
            finished_at: started_at,
            collections: Vec::new(),
            total_documents: 0,
            checkpoint: None,
        }
    }

    pub fn record(&mut self, collection: &str, count: u64) {
        self.collections.push(CollectionOutcome {
            collection: collection.to_string(),
            count,
        });
        self.total_documents += count;
    }

    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self
    }

    /// Count recorded for a collection, if it was processed.
    pub fn count_for(&self, collection: &str) -> Option<u64> {
        self.collections
            .iter()
            .find(|outcome| outcome.collection == collection)
            .map(|outcome| outcome.count)
    }
}

/// Outcome of a retention cleanup pass over one target cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub keep_weeks: u32,
    pub cutoff: WeekStamp,
    pub dropped: Vec<String>,
    pub retained: Vec<String>,
    /// Names under a managed prefix whose week/year suffix did not parse.
    pub skipped: Vec<String>,
}

/// Outcome of a multi-database run, one report per database in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub mode: BackupMode,
    pub runs: Vec<RunReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
}

impl BatchReport {
    pub fn total_documents(&self) -> u64 {
        self.runs.iter().map(|run| run.total_documents).sum()
    }
}

/// Snapshot of a target database: document counts and incremental checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetStatus {
    pub db: String,
    pub collections: Vec<CollectionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_incremental_at: Option<DateTime<Utc>>,
}
