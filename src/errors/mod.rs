//! Error handling module for the sync engine.
//!
//! Provides a central error type with stable error codes. Row-level parse
//! problems are not errors at this level; they are logged and skipped by the
//! parsers. Only document- and carrier-scope failures surface here.

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const CONFIG_MISSING_FIELD: &str = "CONFIG_MISSING_FIELD";
    pub const EMPTY_RESULT_SET: &str = "EMPTY_RESULT_SET";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const OFFLINE: &str = "OFFLINE";
    pub const SYNC_IN_PROGRESS: &str = "SYNC_IN_PROGRESS";
}

/// Engine error type.
#[derive(Debug)]
pub enum SyncError {
    /// Fetch failed, timed out, or returned a non-2xx status
    Transport(String),
    /// Remote config sheet lacks a required key
    ConfigMissingField(&'static str),
    /// A carrier's dataset parsed to zero valid records; commit refused
    EmptyResultSet(String),
    /// Local store error
    Database(String),
    /// Network reported unreachable before the batch started
    Offline,
    /// A sync for this carrier is already in flight
    SyncInProgress(String),
}

impl SyncError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Transport(_) => codes::TRANSPORT_ERROR,
            SyncError::ConfigMissingField(_) => codes::CONFIG_MISSING_FIELD,
            SyncError::EmptyResultSet(_) => codes::EMPTY_RESULT_SET,
            SyncError::Database(_) => codes::DATABASE_ERROR,
            SyncError::Offline => codes::OFFLINE,
            SyncError::SyncInProgress(_) => codes::SYNC_IN_PROGRESS,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            SyncError::Transport(msg) => msg.clone(),
            SyncError::ConfigMissingField(field) => {
                format!("remote config is missing required field '{}'", field)
            }
            SyncError::EmptyResultSet(carrier) => {
                format!("dataset for carrier '{}' parsed to zero records", carrier)
            }
            SyncError::Database(msg) => msg.clone(),
            SyncError::Offline => "network unreachable".to_string(),
            SyncError::SyncInProgress(carrier) => {
                format!("sync already in progress for carrier '{}'", carrier)
            }
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for SyncError {}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        SyncError::Database(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Transport error: {:?}", err);
        SyncError::Transport(format!("Transport error: {}", err))
    }
}
