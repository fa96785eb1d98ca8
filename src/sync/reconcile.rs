//! Version reconciliation: remote directory entry vs. local metadata.

use crate::models::CarrierMetadata;

/// What to do with a carrier, decided before any dataset fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// No local metadata exists yet
    NeedsInitialDownload,
    /// Remote advertises a newer version than the local ledger
    NeedsUpdate,
    /// Local version is current; skip without a download
    UpToDate,
    /// Remote did not advertise a version; nothing to compare against, so
    /// only an explicit forced sync may proceed
    Unknown,
}

/// Classify one carrier from its advertised remote version and the locally
/// persisted metadata, if any.
pub fn classify(remote_version: Option<i64>, local: Option<&CarrierMetadata>) -> SyncAction {
    match (remote_version, local) {
        (None, _) => SyncAction::Unknown,
        (Some(_), None) => SyncAction::NeedsInitialDownload,
        (Some(remote), Some(meta)) if remote > meta.current_version => SyncAction::NeedsUpdate,
        (Some(_), Some(_)) => SyncAction::UpToDate,
    }
}
