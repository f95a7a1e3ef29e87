//! Custom error types for the backup engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Connection error ({uri}): {message}")]
    Connection { uri: String, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl EngineError {
    /// True when the error happened while establishing a connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, EngineError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
