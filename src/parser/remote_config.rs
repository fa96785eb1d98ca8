//! Parsers for the key/value sheets: remote config and app versions.

use std::collections::HashMap;

use crate::errors::SyncError;
use crate::models::RemoteConfig;

/// Parsed app versions sheet.
#[derive(Debug, Clone)]
pub struct VersionSheet {
    pub latest_version: String,
    pub min_version: String,
    pub download_url: Option<String>,
    pub update_message: Option<String>,
}

/// Parse the remote config sheet.
///
/// Row 0 is a header and is skipped; column 0 is the key, column 1 the
/// value, later duplicate keys overwrite earlier ones. The required keys are
/// `version`, `carriers_gid` and `base_url`.
pub fn parse_remote_config(rows: &[Vec<String>]) -> Result<RemoteConfig, SyncError> {
    let map = key_value_map(rows);
    Ok(RemoteConfig {
        version: required(&map, "version")?,
        update_note: optional(&map, "update_note"),
        min_app_version: optional(&map, "min_app_version"),
        carriers_gid: required(&map, "carriers_gid")?,
        base_url: required(&map, "base_url")?,
        app_versions_gid: optional(&map, "app_versions_gid"),
    })
}

/// Parse the app versions sheet used by the update gate.
pub fn parse_version_sheet(rows: &[Vec<String>]) -> Result<VersionSheet, SyncError> {
    let map = key_value_map(rows);
    Ok(VersionSheet {
        latest_version: required(&map, "latest_version")?,
        min_version: required(&map, "min_version")?,
        download_url: optional(&map, "download_url"),
        update_message: optional(&map, "update_message"),
    })
}

fn key_value_map(rows: &[Vec<String>]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for row in rows.iter().skip(1) {
        if row.len() < 2 {
            continue;
        }
        map.insert(row[0].to_lowercase(), row[1].clone());
    }
    map
}

fn required(map: &HashMap<String, String>, key: &'static str) -> Result<String, SyncError> {
    map.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or(SyncError::ConfigMissingField(key))
}

fn optional(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key).filter(|v| !v.is_empty()).cloned()
}
