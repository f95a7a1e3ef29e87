//! Backup Engine Library
//!
//! Cross-cluster backup and snapshot replication for document stores:
//! checkpointed incremental copies, identity-based delta copies, weekly
//! full snapshots and retention cleanup of old snapshot databases.

pub mod checkpoint;
pub mod clock;
pub mod engine;
pub mod report;
pub mod store;
pub mod utils;
pub mod week;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{BackupEngine, ClusterPair, DEFAULT_KEEP_WEEKS};
pub use report::{BackupMode, BatchReport, CleanupReport, CollectionOutcome, RunReport, TargetStatus};
pub use store::{ClusterConnection, ConnectOptions, Connector, Filter, Namespace, Projection};
pub use utils::errors::EngineError;
pub use week::WeekStamp;
pub type Result<T> = std::result::Result<T, EngineError>;
