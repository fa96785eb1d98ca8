//! Database module for SQLite persistence.
//!
//! SQLite holds both coupled stores: schedule rows and the per-carrier
//! metadata ledger. Keeping them in one database lets the commit step
//! replace a carrier's rows and write its metadata in a single transaction.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS carriers (
            carrier_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            current_version INTEGER NOT NULL,
            previous_version INTEGER,
            downloaded_at TEXT NOT NULL,
            updated_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            schedule_count INTEGER NOT NULL DEFAULT 0,
            source_type TEXT NOT NULL,
            source_ref TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL,
            carrier_name TEXT NOT NULL,
            departure_time TEXT NOT NULL,
            direction TEXT NOT NULL,
            line_designation TEXT,
            designation_description TEXT,
            stop_name TEXT NOT NULL,
            bus_line TEXT NOT NULL,
            operating_days TEXT NOT NULL,
            stops TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prefs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_schedules_carrier ON schedules(carrier_id);
        CREATE INDEX IF NOT EXISTS idx_schedules_departure ON schedules(departure_time);
        CREATE INDEX IF NOT EXISTS idx_carriers_active ON carriers(is_active);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
