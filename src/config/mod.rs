//! Configuration module for the sync engine.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the remote config sheet (the entry point for every sync)
    pub config_url: String,
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Connect and read timeout for remote fetches, in seconds
    pub http_timeout_secs: u64,
    /// Version of the embedding application, compared by the update gate
    pub app_version: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config_url = env::var("CARRIER_SYNC_CONFIG_URL").unwrap_or_default();

        let db_path = env::var("CARRIER_SYNC_DB_PATH")
            .unwrap_or_else(|_| "./data/carriers.sqlite".to_string())
            .into();

        let http_timeout_secs = env::var("CARRIER_SYNC_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let app_version =
            env::var("CARRIER_SYNC_APP_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

        let log_level = env::var("CARRIER_SYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            config_url,
            db_path,
            http_timeout_secs,
            app_version,
            log_level,
        }
    }
}
