//! Backup Runner Library
//!
//! Configuration, command-line surface and cron scheduling around
//! `backup_engine`.

pub mod cli;
pub mod config;
pub mod jobs;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::RunnerError;
pub type Result<T> = std::result::Result<T, RunnerError>;
