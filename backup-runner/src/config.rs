//! Configuration management for the backup runner.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (a `.env` file in the working directory is honoured).

use crate::utils::errors::{Result, RunnerError};
use backup_engine::{BackupMode, ClusterPair, ConnectOptions, DEFAULT_KEEP_WEEKS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: ClusterConfig,
    pub target: ClusterConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Databases processed when a command or schedule names none
    #[serde(default)]
    pub databases: Vec<String>,

    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Connection URI
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum connections per cluster
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Seconds before an idle pooled connection is closed
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,

    /// Seconds allowed for connection establishment and server selection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Weekly snapshots older than this many weeks are dropped
    #[serde(default = "default_keep_weeks")]
    pub keep_weeks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub mode: BackupMode,

    /// Cron expression with a seconds field, e.g. `0 0 3 * * Sun`
    pub cron: String,

    /// Overrides the top-level database list
    #[serde(default)]
    pub databases: Option<Vec<String>>,

    /// Run retention cleanup after full snapshots
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

// Default values
fn default_max_pool_size() -> u32 {
    10
}

fn default_max_idle_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_keep_weeks() -> u32 {
    DEFAULT_KEEP_WEEKS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cleanup() -> bool {
    true
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            max_idle_secs: default_max_idle_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_weeks: default_keep_weeks(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: ClusterConfig {
                uri: "mongodb://localhost:27017".to_string(),
            },
            target: ClusterConfig {
                uri: "mongodb://localhost:27018".to_string(),
            },
            pool: PoolConfig::default(),
            retention: RetentionConfig::default(),
            log: LogConfig::default(),
            databases: Vec::new(),
            schedules: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// File (or defaults), then `.env` and process environment overrides,
    /// then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BACKUP_*` / `LOG_LEVEL` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(uri) = lookup("BACKUP_SOURCE_URI") {
            self.source.uri = uri;
        }
        if let Some(uri) = lookup("BACKUP_TARGET_URI") {
            self.target.uri = uri;
        }
        if let Some(weeks) = lookup("BACKUP_KEEP_WEEKS") {
            self.retention.keep_weeks = weeks
                .parse()
                .map_err(|_| RunnerError::Config(format!("BACKUP_KEEP_WEEKS is not a number: {}", weeks)))?;
        }
        if let Some(list) = lookup("BACKUP_DATABASES") {
            self.databases = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.uri.trim().is_empty() {
            return Err(RunnerError::Config("source.uri is empty".to_string()));
        }
        if self.target.uri.trim().is_empty() {
            return Err(RunnerError::Config("target.uri is empty".to_string()));
        }
        if self.retention.keep_weeks == 0 {
            return Err(RunnerError::Config("retention.keep_weeks must be at least 1".to_string()));
        }
        if self.pool.max_pool_size == 0 {
            return Err(RunnerError::Config("pool.max_pool_size must be at least 1".to_string()));
        }
        for schedule in &self.schedules {
            let databases = schedule.databases.as_ref().unwrap_or(&self.databases);
            if databases.is_empty() {
                return Err(RunnerError::Config(format!(
                    "schedule `{}` ({}) has no databases: set `databases` on it or at the top level",
                    schedule.cron, schedule.mode
                )));
            }
        }
        Ok(())
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            max_pool_size: self.pool.max_pool_size,
            max_idle_time: Duration::from_secs(self.pool.max_idle_secs),
            connect_timeout: Duration::from_secs(self.pool.connect_timeout_secs),
        }
    }

    pub fn cluster_pair(&self) -> ClusterPair {
        ClusterPair::new(&self.source.uri, &self.target.uri)
    }
}
