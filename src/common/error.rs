//! Error types for kvlock

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    #[error("Store error: {0}")]
    Store(String),

    #[error("Store operation timeout: {0}")]
    Timeout(String),

    #[error("Store is closed")]
    Closed,

    #[error("Store does not support {0}")]
    Unsupported(&'static str),

    // === Lock State Errors ===
    #[error("Corrupted lock state for key {key}: {value:?}")]
    CorruptState { key: String, value: String },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock acquisition cancelled")]
    Cancelled,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Did this error come from talking to the backing store?
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Timeout(_) | Error::Closed)
    }

    /// Is the stored value unreadable by this protocol?
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptState { .. })
    }

    pub(crate) fn corrupt(key: &str, value: &str) -> Self {
        Error::CorruptState {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Store(e.to_string())
        }
    }
}
