//! Error types for the key-value facade

use thiserror::Error;

/// Errors that can occur in facade operations
///
/// Absence of a key is never represented here: reads report it through
/// `Option`, omission from a result map, or a default value.
#[derive(Error, Debug)]
pub enum FacadeError {
    /// The remote store could not be reached or rejected the command.
    /// Never retried here; the connection handle owns retry policy.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] redis::RedisError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid TTL: {0} minutes (must be at least 1)")]
    InvalidTtl(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FacadeError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        FacadeError::InvalidConfiguration(msg.into())
    }

    /// True when the error came from the store connection rather than
    /// from local validation or encoding.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, FacadeError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, FacadeError>;
