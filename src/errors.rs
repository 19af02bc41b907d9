//! Cache error types

use thiserror::Error;

/// Cache error types.
///
/// Only construction-time variants (`ConfigurationInvalid`,
/// `ParameterConflict`, `CacheUnavailable`) are meant to reach a caller as
/// `Err`. Every data-path variant is caught internally by the two-tier
/// engine and turned into a recorded miss or a best-effort degraded
/// success; see `generic_cache` and `ai_cache`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("parameter conflict: {0}")]
    ParameterConflict(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("remote transient error: {0}")]
    RemoteTransient(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("entry too large: {size} bytes, max: {max_size} bytes")]
    EntryTooLarge { size: usize, max_size: usize },

    #[error("multiple errors occurred: {0:?}")]
    MultipleErrors(Vec<String>),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Cache result type.
pub type CacheResult<T> = Result<T, CacheError>;

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::RemoteTransient(err.to_string())
        } else {
            CacheError::Redis(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::ConfigurationInvalid(err.to_string())
    }
}
