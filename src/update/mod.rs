//! App-update gate.
//!
//! Independent of carrier sync but reuses the remote config fetch and the
//! decoder. Automatic checks are throttled to one per 24 hours through a
//! timestamp in the injected key-value store; manual checks never touch the
//! throttle, so a user-initiated check does not suppress the next scheduled
//! automatic one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::db::Repository;
use crate::errors::SyncError;
use crate::models::UpdateCheck;
use crate::net::{document_url, RemoteSource};
use crate::parser::{decode, parse_remote_config, parse_version_sheet};

pub const AUTO_CHECK_ENABLED_KEY: &str = "update.auto_check_enabled";
pub const LAST_AUTO_CHECK_KEY: &str = "update.last_auto_check";

const AUTO_CHECK_INTERVAL_HOURS: i64 = 24;

/// Narrow preference-store collaborator: get/set/clear by key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;
    async fn clear(&self, key: &str) -> Result<(), SyncError>;
}

#[async_trait]
impl KeyValueStore for Repository {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        self.kv_get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.kv_set(key, value).await
    }

    async fn clear(&self, key: &str) -> Result<(), SyncError> {
        self.kv_clear(key).await
    }
}

/// Computes update-required / update-available state from the remote app
/// versions sheet.
pub struct UpdateGate {
    kv: Arc<dyn KeyValueStore>,
    source: Arc<dyn RemoteSource>,
    config_url: String,
    current_version: String,
}

impl UpdateGate {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        source: Arc<dyn RemoteSource>,
        config_url: String,
        current_version: String,
    ) -> Self {
        Self {
            kv,
            source,
            config_url,
            current_version,
        }
    }

    /// Enable or disable automatic checks.
    pub async fn set_auto_check_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        self.kv
            .set(AUTO_CHECK_ENABLED_KEY, if enabled { "true" } else { "false" })
            .await
    }

    /// True when automatic checks are enabled and at least 24 hours have
    /// passed since the last automatic check.
    pub async fn should_auto_check(&self) -> Result<bool, SyncError> {
        let enabled = self
            .kv
            .get(AUTO_CHECK_ENABLED_KEY)
            .await?
            .map(|v| v == "true")
            .unwrap_or(true);
        if !enabled {
            return Ok(false);
        }
        match self.kv.get(LAST_AUTO_CHECK_KEY).await? {
            None => Ok(true),
            Some(stamp) => match DateTime::parse_from_rfc3339(&stamp) {
                Ok(last) => Ok(Utc::now().signed_duration_since(last)
                    >= Duration::hours(AUTO_CHECK_INTERVAL_HOURS)),
                // An unreadable stamp must not wedge the throttle shut
                Err(_) => Ok(true),
            },
        }
    }

    /// Fetch the remote app versions sheet and compare against the current
    /// application version.
    ///
    /// Automatic checks (`manual = false`) stamp the throttle timestamp at
    /// entry, regardless of outcome, so the 24-hour window holds even when
    /// the check fails or finds nothing.
    pub async fn check_for_updates(&self, manual: bool) -> Result<UpdateCheck, SyncError> {
        if !manual {
            self.kv
                .set(LAST_AUTO_CHECK_KEY, &Utc::now().to_rfc3339())
                .await?;
        }

        let config_text = self.source.fetch_url(&self.config_url).await?;
        let config = parse_remote_config(&decode(&config_text))?;
        let gid = config
            .app_versions_gid
            .ok_or(SyncError::ConfigMissingField("app_versions_gid"))?;

        let sheet_text = self
            .source
            .fetch_url(&document_url(&config.base_url, &gid))
            .await?;
        let sheet = parse_version_sheet(&decode(&sheet_text))?;

        let check = UpdateCheck {
            update_available: version_lt(&self.current_version, &sheet.latest_version),
            update_required: version_lt(&self.current_version, &sheet.min_version),
            latest_version: sheet.latest_version,
            min_version: sheet.min_version,
            download_url: sheet.download_url,
            update_message: sheet.update_message,
        };
        info!(
            current = %self.current_version,
            latest = %check.latest_version,
            available = check.update_available,
            required = check.update_required,
            "update check completed"
        );
        Ok(check)
    }
}

/// Dotted numeric version comparison; non-numeric or missing components
/// count as zero.
fn version_lt(a: &str, b: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (
            a.get(i).copied().unwrap_or(0),
            b.get(i).copied().unwrap_or(0),
        );
        if x != y {
            return x < y;
        }
    }
    false
}
