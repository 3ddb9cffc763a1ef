//! Error types for astrocron.

use thiserror::Error;

/// Errors that can occur while editing and committing schedule events.
#[derive(Error, Debug)]
pub enum AstroCronError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid server UTC offset: {0} minutes")]
    InvalidOffset(i32),

    #[error("Unknown time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("Event '{0}' not found")]
    EventNotFound(String),

    #[error("Object directory error: {0}")]
    Directory(String),

    #[error("Event store error: {0}")]
    Store(String),

    #[error("Event store request timed out after {0}s")]
    StoreTimeout(u64),

    #[error("Event cannot be saved: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for astrocron operations.
pub type AstroCronResult<T> = Result<T, AstroCronError>;
