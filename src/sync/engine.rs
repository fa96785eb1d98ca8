//! Carrier update orchestrator.
//!
//! Executes the fetch, parse, validate, atomic-replace, metadata-commit
//! sequence per carrier, with failure isolation per carrier: row-level and
//! carrier-level problems are contained in the returned outcome list, and
//! only config- or directory-level failures abort a batch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{error, info};

use crate::db::Repository;
use crate::errors::SyncError;
use crate::models::{
    CarrierDirectoryEntry, CarrierMetadata, RemoteConfig, SourceType, SyncOutcome,
};
use crate::net::{document_url, Connectivity, RemoteSource};
use crate::parser::{decode, parse_directory, parse_remote_config, parse_schedules};
use crate::sync::{classify, SyncAction};

/// The orchestrator. Sole writer of carrier metadata and schedule rows.
#[derive(Clone)]
pub struct SyncEngine {
    repo: Arc<Repository>,
    source: Arc<dyn RemoteSource>,
    connectivity: Arc<dyn Connectivity>,
    config_url: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SyncEngine {
    pub fn new(
        repo: Arc<Repository>,
        source: Arc<dyn RemoteSource>,
        connectivity: Arc<dyn Connectivity>,
        config_url: String,
    ) -> Self {
        Self {
            repo,
            source,
            connectivity,
            config_url,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Fetch and parse the remote config sheet.
    pub async fn fetch_remote_config(&self) -> Result<RemoteConfig, SyncError> {
        let text = self.source.fetch_url(&self.config_url).await?;
        parse_remote_config(&decode(&text))
    }

    /// Sync every active carrier in the remote directory.
    ///
    /// Carriers classified `UpToDate` are skipped without a dataset fetch,
    /// as are carriers with no advertised version; `force` bypasses both.
    /// A failure of one carrier never touches another carrier's state.
    pub async fn sync_all(&self, force: bool) -> Result<Vec<SyncOutcome>, SyncError> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let config = self.fetch_remote_config().await?;
        let directory_text = self
            .source
            .fetch_url(&document_url(&config.base_url, &config.carriers_gid))
            .await?;
        let entries = parse_directory(&decode(&directory_text));
        info!(
            carriers = entries.len(),
            force, "carrier directory fetched, reconciling"
        );

        let mut outcomes = Vec::new();
        for entry in entries.iter().filter(|e| e.active) {
            outcomes.push(self.sync_entry(entry, &config.base_url, force).await);
        }
        info!(summary = %SyncOutcome::summarize(&outcomes), "sync batch finished");
        Ok(outcomes)
    }

    /// Sync a single carrier by id and dataset ref.
    ///
    /// Fetches the remote config for the base URL, then runs the same
    /// commit sequence as a batch member. `declared_version` is the version
    /// the caller obtained from the directory; `None` re-commits the
    /// carrier's current version (1 on first download).
    pub async fn sync_one(
        &self,
        carrier_id: &str,
        dataset_ref: &str,
        declared_version: Option<i64>,
    ) -> SyncOutcome {
        let config = match self.fetch_remote_config().await {
            Ok(config) => config,
            Err(err) => {
                error!(carrier = carrier_id, error = %err, "remote config fetch failed");
                return SyncOutcome::failed(carrier_id, err.to_string());
            }
        };
        let result = self
            .sync_carrier(
                carrier_id,
                carrier_id,
                dataset_ref,
                None,
                &config.base_url,
                declared_version,
            )
            .await;
        self.outcome_of(carrier_id, result)
    }

    /// Rewind the version ledger to the previous version.
    ///
    /// Returns false when there is no previous version to restore. This
    /// affects only future reconciliation decisions; the previous schedule
    /// row-set is not retained, so content comes back on the next fetch of
    /// that version.
    pub async fn rollback(&self, carrier_id: &str) -> Result<bool, SyncError> {
        let Some(meta) = self.repo.get_carrier(carrier_id).await? else {
            return Ok(false);
        };
        let Some(previous) = meta.previous_version else {
            return Ok(false);
        };
        self.repo
            .set_carrier_versions(carrier_id, previous, None)
            .await?;
        info!(
            carrier = carrier_id,
            from = meta.current_version,
            to = previous,
            "version ledger rolled back"
        );
        Ok(true)
    }

    /// Soft-delete a carrier.
    pub async fn deactivate_carrier(&self, carrier_id: &str) -> Result<bool, SyncError> {
        self.repo.deactivate_carrier(carrier_id).await
    }

    /// Hard-delete a carrier and its schedule rows.
    pub async fn delete_carrier(&self, carrier_id: &str) -> Result<bool, SyncError> {
        self.repo.delete_carrier(carrier_id).await
    }

    /// Remove all carriers and schedule rows.
    pub async fn delete_all_carriers(&self) -> Result<(), SyncError> {
        self.repo.delete_all_carriers().await
    }

    async fn sync_entry(
        &self,
        entry: &CarrierDirectoryEntry,
        base_url: &str,
        force: bool,
    ) -> SyncOutcome {
        // A metadata read failure is contained like any other per-carrier
        // error; only config and directory problems abort the batch
        let local = match self.repo.get_carrier(entry.carrier_id()).await {
            Ok(local) => local,
            Err(err) => return self.outcome_of(entry.carrier_id(), Err(err)),
        };
        let action = classify(entry.remote_version, local.as_ref());

        if !force && matches!(action, SyncAction::UpToDate | SyncAction::Unknown) {
            info!(carrier = %entry.name, ?action, "carrier skipped");
            return SyncOutcome::skipped(entry.carrier_id());
        }

        let result = self
            .sync_carrier(
                entry.carrier_id(),
                &entry.name,
                &entry.dataset_ref,
                entry.description.as_deref(),
                base_url,
                entry.remote_version,
            )
            .await;
        self.outcome_of(entry.carrier_id(), result)
    }

    /// Fetch, parse and commit one carrier. Aborts before touching either
    /// store when the fetch fails or the parse yields zero records, so the
    /// previous dataset and metadata stay exactly as they were.
    async fn sync_carrier(
        &self,
        carrier_id: &str,
        carrier_name: &str,
        dataset_ref: &str,
        description: Option<&str>,
        base_url: &str,
        declared_version: Option<i64>,
    ) -> Result<usize, SyncError> {
        let _guard = self.begin_flight(carrier_id)?;

        let text = self
            .source
            .fetch_url(&document_url(base_url, dataset_ref))
            .await?;
        let records = parse_schedules(carrier_id, carrier_name, &decode(&text));
        if records.is_empty() {
            return Err(SyncError::EmptyResultSet(carrier_id.to_string()));
        }

        let existing = self.repo.get_carrier(carrier_id).await?;
        let now = Utc::now().to_rfc3339();
        let meta = match existing {
            Some(m) => {
                let current = declared_version.unwrap_or(m.current_version);
                // previous < current must hold: an upgrade records the old
                // current, a same-version recommit keeps the ledger as is,
                // and a forced downgrade drops any stale previous entirely
                let previous = Some(m.current_version)
                    .filter(|p| *p < current)
                    .or_else(|| m.previous_version.filter(|p| *p < current));
                let merged_description =
                    description.map(str::to_string).or_else(|| m.description.clone());
                CarrierMetadata {
                    description: merged_description,
                    current_version: current,
                    previous_version: previous,
                    updated_at: Some(now),
                    schedule_count: records.len() as i64,
                    source_ref: Some(dataset_ref.to_string()),
                    ..m
                }
            }
            None => CarrierMetadata {
                carrier_id: carrier_id.to_string(),
                name: carrier_name.to_string(),
                description: description.map(str::to_string),
                current_version: declared_version.unwrap_or(1),
                previous_version: None,
                downloaded_at: now,
                updated_at: None,
                is_active: true,
                schedule_count: records.len() as i64,
                source_type: SourceType::RemoteSheet,
                source_ref: Some(dataset_ref.to_string()),
            },
        };

        self.repo.commit_carrier_update(&meta, &records).await?;
        info!(
            carrier = carrier_id,
            version = meta.current_version,
            records = records.len(),
            "carrier committed"
        );
        Ok(records.len())
    }

    fn outcome_of(&self, carrier_id: &str, result: Result<usize, SyncError>) -> SyncOutcome {
        match result {
            Ok(count) => SyncOutcome::updated(carrier_id, count),
            Err(err) => {
                error!(carrier = carrier_id, error = %err, "carrier sync failed");
                SyncOutcome::failed(carrier_id, err.to_string())
            }
        }
    }

    /// Reserve the single-flight slot for a carrier. The guard releases the
    /// slot on drop, including when the sync future is cancelled.
    fn begin_flight(&self, carrier_id: &str) -> Result<FlightGuard, SyncError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(carrier_id.to_string()) {
            return Err(SyncError::SyncInProgress(carrier_id.to_string()));
        }
        Ok(FlightGuard {
            carrier_id: carrier_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

struct FlightGuard {
    carrier_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.carrier_id);
    }
}
