//! Per-carrier sync outcomes returned to the caller.
//!
//! Transient values for UI feedback; never persisted.

use serde::{Deserialize, Serialize};

/// Terminal state of one carrier within a sync batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Updated,
    Skipped,
    Failed,
    RolledBack,
}

/// Result of syncing one carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub carrier_id: String,
    pub status: SyncStatus,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn updated(carrier_id: &str, record_count: usize) -> Self {
        Self {
            carrier_id: carrier_id.to_string(),
            status: SyncStatus::Updated,
            record_count,
            error: None,
        }
    }

    pub fn skipped(carrier_id: &str) -> Self {
        Self {
            carrier_id: carrier_id.to_string(),
            status: SyncStatus::Skipped,
            record_count: 0,
            error: None,
        }
    }

    pub fn failed(carrier_id: &str, error: String) -> Self {
        Self {
            carrier_id: carrier_id.to_string(),
            status: SyncStatus::Failed,
            record_count: 0,
            error: Some(error),
        }
    }

    /// One-line summary of a batch, suitable for an aggregated notification.
    pub fn summarize(outcomes: &[SyncOutcome]) -> String {
        let updated = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Updated)
            .count();
        let skipped = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Skipped)
            .count();
        let failures: Vec<String> = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Failed)
            .map(|o| {
                format!(
                    "{} — {}",
                    o.carrier_id,
                    o.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        let mut parts = vec![format!("{} updated", updated)];
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        if !failures.is_empty() {
            parts.push(format!("{} failed: {}", failures.len(), failures.join("; ")));
        }
        parts.join(", ")
    }
}
