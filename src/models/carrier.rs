//! Per-carrier metadata: the authoritative version ledger.

use serde::{Deserialize, Serialize};

/// Where a carrier's dataset came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    RemoteSheet,
    LocalImport,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::RemoteSheet => "remote_sheet",
            SourceType::LocalImport => "local_import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remote_sheet" => Some(SourceType::RemoteSheet),
            "local_import" => Some(SourceType::LocalImport),
            _ => None,
        }
    }
}

/// Persisted metadata row for one carrier.
///
/// Created on the first successful download; the version fields are written
/// only by the orchestrator's commit step. Schedule rows for a carrier must
/// always correspond to the version recorded here. Invariant:
/// `previous_version`, when present, is strictly less than `current_version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CarrierMetadata {
    pub carrier_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub current_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<i64>,
    pub downloaded_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub is_active: bool,
    pub schedule_count: i64,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}
