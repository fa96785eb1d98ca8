//! Database repository for schedule and metadata operations.
//!
//! Uses prepared statements and transactions for data integrity. Every
//! mutation bumps the revision counter in the `meta` table; the new revision
//! is published on a watch channel so UI observers can re-read snapshots.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tokio::sync::watch;

use crate::errors::SyncError;
use crate::models::{BusSchedule, CarrierMetadata, SourceType};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    revision_tx: watch::Sender<i64>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self { pool, revision_tx }
    }

    /// Subscribe to revision bumps. Observers re-read snapshots on change;
    /// they see either the pre-commit or post-commit state of a carrier,
    /// never a half-write.
    pub fn watch_revision(&self) -> watch::Receiver<i64> {
        self.revision_tx.subscribe()
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, SyncError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Increment the revision ID, publish it, and return the new value.
    async fn increment_revision(&self) -> Result<i64, SyncError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        let revision = self.get_revision_id().await?;
        self.revision_tx.send_replace(revision);
        Ok(revision)
    }

    // ==================== CARRIER METADATA ====================

    /// Get metadata for a single carrier.
    pub async fn get_carrier(&self, carrier_id: &str) -> Result<Option<CarrierMetadata>, SyncError> {
        let row = sqlx::query(
            "SELECT carrier_id, name, description, current_version, previous_version, downloaded_at, updated_at, is_active, schedule_count, source_type, source_ref FROM carriers WHERE carrier_id = ?"
        )
        .bind(carrier_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(carrier_from_row))
    }

    /// List all carriers, including deactivated ones (they stay visible for
    /// display even though sync skips them).
    pub async fn list_carriers(&self) -> Result<Vec<CarrierMetadata>, SyncError> {
        let rows = sqlx::query(
            "SELECT carrier_id, name, description, current_version, previous_version, downloaded_at, updated_at, is_active, schedule_count, source_type, source_ref FROM carriers ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(carrier_from_row).collect())
    }

    /// Rewrite a carrier's version ledger fields. Used by rollback.
    pub async fn set_carrier_versions(
        &self,
        carrier_id: &str,
        current_version: i64,
        previous_version: Option<i64>,
    ) -> Result<bool, SyncError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE carriers SET current_version = ?, previous_version = ?, updated_at = ? WHERE carrier_id = ?"
        )
        .bind(current_version)
        .bind(previous_version)
        .bind(&now)
        .bind(carrier_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.increment_revision().await?;
        Ok(true)
    }

    /// Soft-delete a carrier: it disappears from sync candidates but keeps
    /// its rows.
    pub async fn deactivate_carrier(&self, carrier_id: &str) -> Result<bool, SyncError> {
        let result = sqlx::query("UPDATE carriers SET is_active = 0 WHERE carrier_id = ?")
            .bind(carrier_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.increment_revision().await?;
        Ok(true)
    }

    /// Hard-delete a carrier and its schedule rows.
    pub async fn delete_carrier(&self, carrier_id: &str) -> Result<bool, SyncError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM schedules WHERE carrier_id = ?")
            .bind(carrier_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM carriers WHERE carrier_id = ?")
            .bind(carrier_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.increment_revision().await?;
        Ok(true)
    }

    /// Remove every carrier and every schedule row.
    pub async fn delete_all_carriers(&self) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM schedules").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM carriers").execute(&mut *tx).await?;
        tx.commit().await?;

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== SCHEDULE ROWS ====================

    /// Read all schedule rows, the snapshot observers consume.
    pub async fn list_schedules(&self) -> Result<Vec<BusSchedule>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, carrier_id, carrier_name, departure_time, direction, line_designation, designation_description, stop_name, bus_line, operating_days, stops FROM schedules ORDER BY carrier_id, departure_time"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(schedule_from_row).collect())
    }

    /// Read one carrier's schedule rows.
    pub async fn list_schedules_for_carrier(
        &self,
        carrier_id: &str,
    ) -> Result<Vec<BusSchedule>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, carrier_id, carrier_name, departure_time, direction, line_designation, designation_description, stop_name, bus_line, operating_days, stops FROM schedules WHERE carrier_id = ? ORDER BY departure_time"
        )
        .bind(carrier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(schedule_from_row).collect())
    }

    /// Atomically replace a carrier's schedule row-set and commit its
    /// metadata in one transaction.
    ///
    /// The schedule replacement is sequenced before the metadata write, so
    /// even without transactional cover an interruption would leave stale
    /// metadata rather than schedule rows that claim a version they are not.
    pub async fn commit_carrier_update(
        &self,
        meta: &CarrierMetadata,
        records: &[BusSchedule],
    ) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM schedules WHERE carrier_id = ?")
            .bind(&meta.carrier_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            let days_json = serde_json::to_string(&record.operating_days).unwrap_or_default();
            let stops_json = serde_json::to_string(&record.stops).unwrap_or_default();
            sqlx::query(
                "INSERT INTO schedules (id, carrier_id, carrier_name, departure_time, direction, line_designation, designation_description, stop_name, bus_line, operating_days, stops) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(&record.id)
            .bind(&record.carrier_id)
            .bind(&record.carrier_name)
            .bind(&record.departure_time)
            .bind(&record.direction)
            .bind(&record.line_designation)
            .bind(&record.designation_description)
            .bind(&record.stop_name)
            .bind(&record.bus_line)
            .bind(&days_json)
            .bind(&stops_json)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO carriers (carrier_id, name, description, current_version, previous_version, downloaded_at, updated_at, is_active, schedule_count, source_type, source_ref) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&meta.carrier_id)
        .bind(&meta.name)
        .bind(&meta.description)
        .bind(meta.current_version)
        .bind(meta.previous_version)
        .bind(&meta.downloaded_at)
        .bind(&meta.updated_at)
        .bind(meta.is_active as i32)
        .bind(meta.schedule_count)
        .bind(meta.source_type.as_str())
        .bind(&meta.source_ref)
        .execute(&mut *tx)
        .await?;

        // Bump the revision inside the same transaction, publish after commit
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let revision = self.get_revision_id().await?;
        self.revision_tx.send_replace(revision);
        Ok(())
    }

    // ==================== PREFERENCES ====================

    /// Get a preference value by key.
    pub async fn kv_get(&self, key: &str) -> Result<Option<String>, SyncError> {
        let row = sqlx::query("SELECT value FROM prefs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    /// Set a preference value.
    pub async fn kv_set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        sqlx::query("INSERT OR REPLACE INTO prefs (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a preference.
    pub async fn kv_clear(&self, key: &str) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM prefs WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn carrier_from_row(row: &sqlx::sqlite::SqliteRow) -> CarrierMetadata {
    let is_active: i32 = row.get("is_active");
    let source_type: String = row.get("source_type");
    CarrierMetadata {
        carrier_id: row.get("carrier_id"),
        name: row.get("name"),
        description: row.get("description"),
        current_version: row.get("current_version"),
        previous_version: row.get("previous_version"),
        downloaded_at: row.get("downloaded_at"),
        updated_at: row.get("updated_at"),
        is_active: is_active != 0,
        schedule_count: row.get("schedule_count"),
        source_type: SourceType::parse(&source_type).unwrap_or(SourceType::RemoteSheet),
        source_ref: row.get("source_ref"),
    }
}

fn schedule_from_row(row: &sqlx::sqlite::SqliteRow) -> BusSchedule {
    let days_str: String = row.get("operating_days");
    let stops_str: String = row.get("stops");
    BusSchedule {
        id: row.get("id"),
        carrier_id: row.get("carrier_id"),
        carrier_name: row.get("carrier_name"),
        departure_time: row.get("departure_time"),
        direction: row.get("direction"),
        line_designation: row.get("line_designation"),
        designation_description: row.get("designation_description"),
        stop_name: row.get("stop_name"),
        bus_line: row.get("bus_line"),
        operating_days: serde_json::from_str(&days_str).unwrap_or_default(),
        stops: serde_json::from_str(&stops_str).unwrap_or_default(),
    }
}
