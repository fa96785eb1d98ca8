//! Value types fetched from the remote document store.
//!
//! These are never persisted; every sync cycle fetches them fresh.

use serde::{Deserialize, Serialize};

/// Remote configuration sheet, the entry point of every sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<String>,
    /// Dataset ref of the carrier directory sheet
    pub carriers_gid: String,
    /// Base URL all dataset refs are resolved against
    pub base_url: String,
    /// Dataset ref of the app versions sheet, if published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_versions_gid: Option<String>,
}

/// One row of the remote carrier directory.
///
/// The carrier name doubles as the carrier id; the directory is the only
/// place carriers are enumerated. `active = false` excludes an entry from
/// sync candidates but not from display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierDirectoryEntry {
    pub name: String,
    pub dataset_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_hint: Option<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version advertised by the directory; absent means the remote did not
    /// declare one and the carrier is not auto-updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_version: Option<i64>,
}

impl CarrierDirectoryEntry {
    pub fn carrier_id(&self) -> &str {
        &self.name
    }
}

/// Result of an app update check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub latest_version: String,
    pub min_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_message: Option<String>,
    pub update_available: bool,
    pub update_required: bool,
}
