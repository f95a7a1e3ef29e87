//! Backup engines.
//!
//! Every top-level call opens its own source and target connections through
//! the engine's [`Connector`], processes collections one after another in
//! store enumeration order, and closes both connections on every exit path
//! once they were opened. Runs against the same source/target pair are not
//! coordinated; callers must not overlap them.

mod batch;
mod cleanup;
mod delta;
mod full;
mod incremental;
mod session;
mod status;

use crate::clock::{Clock, SystemClock};
use crate::store::{ConnectOptions, Connector};
use std::sync::Arc;

/// Retention window used when the caller does not pick one.
pub const DEFAULT_KEEP_WEEKS: u32 = 26;

/// Modification timestamp consulted by incremental backups.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Source and target cluster URIs of a backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPair {
    pub source_uri: String,
    pub target_uri: String,
}

impl ClusterPair {
    pub fn new(source_uri: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            target_uri: target_uri.into(),
        }
    }
}

/// Entry point for all backup modes and snapshot retention.
#[derive(Clone)]
pub struct BackupEngine {
    connector: Arc<dyn Connector>,
    options: ConnectOptions,
    clock: Arc<dyn Clock>,
}

impl BackupEngine {
    pub fn new(connector: Arc<dyn Connector>, options: ConnectOptions) -> Self {
        Self {
            connector,
            options,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. with a [`crate::FixedClock`] in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}
