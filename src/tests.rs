//! Integration tests for the sync engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::db::{init_database, Repository};
use crate::errors::{codes, SyncError};
use crate::models::{SyncStatus, Weekday};
use crate::net::{document_url, AlwaysOnline, Connectivity, RemoteSource};
use crate::sync::SyncEngine;
use crate::update::{UpdateGate, AUTO_CHECK_ENABLED_KEY, LAST_AUTO_CHECK_KEY};

const CONFIG_URL: &str = "https://remote.example/config";
const BASE_URL: &str = "https://remote.example/data";

/// In-memory remote source; stands in for the HTTP transport.
struct FakeSource {
    docs: Mutex<HashMap<String, String>>,
    /// When set, fetches of this URL wait until `release` is notified
    block_url: Mutex<Option<String>>,
    release: Notify,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            block_url: Mutex::new(None),
            release: Notify::new(),
        }
    }

    fn set_doc(&self, url: &str, text: &str) {
        self.docs
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }

    fn remove_doc(&self, url: &str) {
        self.docs.lock().unwrap().remove(url);
    }

    fn block(&self, url: &str) {
        *self.block_url.lock().unwrap() = Some(url.to_string());
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn fetch_url(&self, url: &str) -> Result<String, SyncError> {
        let blocked = self.block_url.lock().unwrap().as_deref() == Some(url);
        if blocked {
            self.release.notified().await;
        }
        self.docs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::Transport(format!("document not found: {}", url)))
    }
}

struct Offline;

impl Connectivity for Offline {
    fn is_online(&self) -> bool {
        false
    }
}

/// Test fixture wiring a temp database, a fake remote and the engine.
struct TestFixture {
    repo: Arc<Repository>,
    source: Arc<FakeSource>,
    engine: SyncEngine,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let source = Arc::new(FakeSource::new());
        source.set_doc(CONFIG_URL, &config_sheet(false));

        let engine = SyncEngine::new(
            Arc::clone(&repo),
            source.clone(),
            Arc::new(AlwaysOnline),
            CONFIG_URL.to_string(),
        );

        TestFixture {
            repo,
            source,
            engine,
            _temp_dir: temp_dir,
        }
    }

    fn set_directory(&self, rows: &[&str]) {
        self.source.set_doc(
            &doc_url("5"),
            &format!(
                "name\tgid\tcolor\ticon\tactive\tdescription\tversion\n{}",
                rows.join("\n")
            ),
        );
    }

    fn set_schedule(&self, gid: &str, rows: &[&str]) {
        self.source.set_doc(
            &doc_url(gid),
            &format!(
                "designation\tdescription\tline\tdeparture\torigin\tdirection\tdays\tstops\n{}",
                rows.join("\n")
            ),
        );
    }
}

fn doc_url(gid: &str) -> String {
    document_url(BASE_URL, gid)
}

fn config_sheet(with_app_versions: bool) -> String {
    let mut sheet = format!(
        "key\tvalue\nversion\t1\ncarriers_gid\t5\nbase_url\t{}\n",
        BASE_URL
    );
    if with_app_versions {
        sheet.push_str("app_versions_gid\t9\n");
    }
    sheet
}

const ACME_TRIP: &str = "X1\tExpress\tNorrby-Söderby\t08:30\tNorrby\tSöderby\tmon,tis\tKyrkan, Torget";
const ACME_TRIP_LATE: &str = "X2\t\tNorrby-Söderby\t17:15\tNorrby\tSöderby\tmon,tis\t";

#[tokio::test]
async fn test_initial_download_creates_ledger_and_rows() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\tLocal line\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP, ACME_TRIP_LATE]);

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, SyncStatus::Updated);
    assert_eq!(outcomes[0].record_count, 2);

    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(meta.previous_version, None);
    assert_eq!(meta.schedule_count, 2);
    assert!(meta.is_active);
    assert_eq!(meta.description.as_deref(), Some("Local line"));
    assert_eq!(meta.source_ref.as_deref(), Some("42"));

    let rows = fixture
        .repo
        .list_schedules_for_carrier("AcmeBus")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].departure_time, "08:30");
    assert_eq!(rows[0].stops.first().unwrap().arrival_time, "08:30");
    assert_eq!(rows[0].operating_days, vec![Weekday::Mon, Weekday::Tue]);
}

#[tokio::test]
async fn test_stale_carrier_updated_to_remote_version() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\tLocal line\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();

    // Remote bumps to version 2 with an extra trip
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\tLocal line\t2"]);
    fixture.set_schedule("42", &[ACME_TRIP, ACME_TRIP_LATE]);

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].carrier_id, "AcmeBus");
    assert_eq!(outcomes[0].status, SyncStatus::Updated);

    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 2);
    assert_eq!(meta.previous_version, Some(1));
    assert!(meta.updated_at.is_some());
    assert_eq!(meta.schedule_count, 2);
}

#[tokio::test]
async fn test_up_to_date_carrier_skipped_and_unchanged() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\tLocal line\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();

    let meta_before = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    let rows_before = fixture.repo.list_schedules().await.unwrap();

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Skipped);

    let meta_after = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    let rows_after = fixture.repo.list_schedules().await.unwrap();
    assert_eq!(meta_before, meta_after);
    assert_eq!(rows_before, rows_after);
}

#[tokio::test]
async fn test_failure_isolation_between_carriers() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&[
        "AcmeBus\t42\t\t\tTRUE\t\t1",
        "NightLine\t43\t\t\tTRUE\t\t1",
    ]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.set_schedule("43", &[ACME_TRIP_LATE]);
    fixture.engine.sync_all(false).await.unwrap();

    let night_before = fixture.repo.get_carrier("NightLine").await.unwrap().unwrap();

    // Both carriers advertise version 2, but NightLine's dataset is gone
    fixture.set_directory(&[
        "AcmeBus\t42\t\t\tTRUE\t\t2",
        "NightLine\t43\t\t\tTRUE\t\t2",
    ]);
    fixture.set_schedule("42", &[ACME_TRIP, ACME_TRIP_LATE]);
    fixture.source.remove_doc(&doc_url("43"));

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Updated);
    assert_eq!(outcomes[1].status, SyncStatus::Failed);
    assert!(outcomes[1]
        .error
        .as_deref()
        .unwrap()
        .contains(codes::TRANSPORT_ERROR));

    // The failed carrier's ledger and rows are byte-for-byte untouched
    let night_after = fixture.repo.get_carrier("NightLine").await.unwrap().unwrap();
    assert_eq!(night_before, night_after);
    assert_eq!(
        fixture
            .repo
            .list_schedules_for_carrier("NightLine")
            .await
            .unwrap()
            .len(),
        1
    );
    // And the successful one committed
    let acme = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(acme.current_version, 2);
}

#[tokio::test]
async fn test_empty_result_set_refuses_commit() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();

    // Version bump, but the new sheet decodes to zero valid rows
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t2"]);
    fixture.set_schedule("42", &[]);

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Failed);
    assert!(outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains(codes::EMPTY_RESULT_SET));

    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(
        fixture
            .repo
            .list_schedules_for_carrier("AcmeBus")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_unknown_version_skipped_unless_forced() {
    let fixture = TestFixture::new().await;
    // No version column at all
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE"]);
    fixture.set_schedule("42", &[ACME_TRIP]);

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Skipped);
    assert!(fixture.repo.get_carrier("AcmeBus").await.unwrap().is_none());

    let outcomes = fixture.engine.sync_all(true).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Updated);
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(meta.previous_version, None);
}

#[tokio::test]
async fn test_inactive_directory_entry_not_synced() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tfalse\t\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);

    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert!(outcomes.is_empty());
    assert!(fixture.repo.get_carrier("AcmeBus").await.unwrap().is_none());
}

#[tokio::test]
async fn test_forced_recommit_keeps_ledger_invariant() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t2"]);
    fixture.engine.sync_all(false).await.unwrap();

    // Forcing a re-sync of the same version must not corrupt previous < current
    let outcomes = fixture.engine.sync_all(true).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Updated);
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 2);
    assert_eq!(meta.previous_version, Some(1));
}

#[tokio::test]
async fn test_forced_downgrade_drops_stale_previous_version() {
    let fixture = TestFixture::new().await;
    fixture.set_schedule("42", &[ACME_TRIP]);
    for version in 1..=3 {
        let row = format!("AcmeBus\t42\t\t\tTRUE\t\t{}", version);
        fixture.set_directory(&[row.as_str()]);
        fixture.engine.sync_all(false).await.unwrap();
    }
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 3);
    assert_eq!(meta.previous_version, Some(2));

    // Remote retracts to version 1; a forced batch must not leave a
    // previous_version at or above the new current
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t1"]);
    let outcomes = fixture.engine.sync_all(true).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Updated);

    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(meta.previous_version, None);
    // With no valid previous version there is nothing to roll back to
    assert!(!fixture.engine.rollback("AcmeBus").await.unwrap());
}

#[tokio::test]
async fn test_metadata_read_error_contained_per_carrier() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("test.sqlite"))
        .await
        .unwrap();
    let repo = Arc::new(Repository::new(pool.clone()));

    let source = Arc::new(FakeSource::new());
    source.set_doc(CONFIG_URL, &config_sheet(false));
    source.set_doc(
        &doc_url("5"),
        "name\tgid\tcolor\ticon\tactive\tdescription\tversion\nAcmeBus\t42\t\t\tTRUE\t\t1",
    );

    let engine = SyncEngine::new(
        repo,
        source,
        Arc::new(AlwaysOnline),
        CONFIG_URL.to_string(),
    );

    // Kill the store: the batch still completes, reporting the carrier as
    // failed instead of aborting
    pool.close().await;
    let outcomes = engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, SyncStatus::Failed);
    assert!(outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains(codes::DATABASE_ERROR));
}

#[tokio::test]
async fn test_rollback_rewinds_version_ledger_only() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();
    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t2"]);
    fixture.set_schedule("42", &[ACME_TRIP, ACME_TRIP_LATE]);
    fixture.engine.sync_all(false).await.unwrap();

    assert!(fixture.engine.rollback("AcmeBus").await.unwrap());
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(meta.previous_version, None);

    // Content is not restored; the version-2 rows remain until a re-fetch
    assert_eq!(
        fixture
            .repo
            .list_schedules_for_carrier("AcmeBus")
            .await
            .unwrap()
            .len(),
        2
    );

    // Nothing left to roll back to
    assert!(!fixture.engine.rollback("AcmeBus").await.unwrap());
    assert!(!fixture.engine.rollback("NoSuchCarrier").await.unwrap());

    // The older ledger version makes the next reconciliation re-fetch v2
    let outcomes = fixture.engine.sync_all(false).await.unwrap();
    assert_eq!(outcomes[0].status, SyncStatus::Updated);
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert_eq!(meta.current_version, 2);
    assert_eq!(meta.previous_version, Some(1));
}

#[tokio::test]
async fn test_config_missing_field_aborts_batch() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_doc(CONFIG_URL, "key\tvalue\nversion\t1\ncarriers_gid\t5\n");
    fixture.set_schedule("42", &[ACME_TRIP]);

    let err = fixture.engine.sync_all(false).await.unwrap_err();
    assert!(matches!(err, SyncError::ConfigMissingField("base_url")));
    assert!(fixture.repo.list_carriers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_aborts_before_any_fetch() {
    let fixture = TestFixture::new().await;
    let engine = SyncEngine::new(
        Arc::clone(&fixture.repo),
        fixture.source.clone(),
        Arc::new(Offline),
        CONFIG_URL.to_string(),
    );
    let err = engine.sync_all(false).await.unwrap_err();
    assert!(matches!(err, SyncError::Offline));
}

#[tokio::test]
async fn test_single_flight_rejects_concurrent_sync_for_same_carrier() {
    let fixture = TestFixture::new().await;
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.source.block(&doc_url("42"));

    let engine = fixture.engine.clone();
    let first = tokio::spawn(async move { engine.sync_one("AcmeBus", "42", Some(1)).await });
    // Let the first sync reach the blocked dataset fetch while holding the slot
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let second = fixture.engine.sync_one("AcmeBus", "42", Some(1)).await;
    assert_eq!(second.status, SyncStatus::Failed);
    assert!(second
        .error
        .as_deref()
        .unwrap()
        .contains(codes::SYNC_IN_PROGRESS));

    fixture.source.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.status, SyncStatus::Updated);
}

#[tokio::test]
async fn test_revision_watch_notifies_on_commit() {
    let fixture = TestFixture::new().await;
    let mut rx = fixture.repo.watch_revision();
    assert_eq!(*rx.borrow_and_update(), 0);

    fixture.set_directory(&["AcmeBus\t42\t\t\tTRUE\t\t1"]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.engine.sync_all(false).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert!(*rx.borrow_and_update() >= 1);
}

#[tokio::test]
async fn test_deactivate_delete_and_delete_all() {
    let fixture = TestFixture::new().await;
    fixture.set_directory(&[
        "AcmeBus\t42\t\t\tTRUE\t\t1",
        "NightLine\t43\t\t\tTRUE\t\t1",
    ]);
    fixture.set_schedule("42", &[ACME_TRIP]);
    fixture.set_schedule("43", &[ACME_TRIP_LATE]);
    fixture.engine.sync_all(false).await.unwrap();

    assert!(fixture.engine.deactivate_carrier("AcmeBus").await.unwrap());
    let meta = fixture.repo.get_carrier("AcmeBus").await.unwrap().unwrap();
    assert!(!meta.is_active);
    // Deactivated carriers stay listed for display
    assert_eq!(fixture.repo.list_carriers().await.unwrap().len(), 2);

    assert!(fixture.engine.delete_carrier("NightLine").await.unwrap());
    assert!(fixture.repo.get_carrier("NightLine").await.unwrap().is_none());
    assert!(fixture
        .repo
        .list_schedules_for_carrier("NightLine")
        .await
        .unwrap()
        .is_empty());
    assert!(!fixture.engine.delete_carrier("NightLine").await.unwrap());

    fixture.engine.delete_all_carriers().await.unwrap();
    assert!(fixture.repo.list_carriers().await.unwrap().is_empty());
    assert!(fixture.repo.list_schedules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_gate_computes_available_and_required() {
    let fixture = TestFixture::new().await;
    fixture.source.set_doc(CONFIG_URL, &config_sheet(true));
    fixture.source.set_doc(
        &doc_url("9"),
        "key\tvalue\nlatest_version\t2.0.0\nmin_version\t1.0.0\ndownload_url\thttps://dl.example\n",
    );

    let gate = UpdateGate::new(
        fixture.repo.clone(),
        fixture.source.clone(),
        CONFIG_URL.to_string(),
        "1.5.0".to_string(),
    );
    let check = gate.check_for_updates(true).await.unwrap();
    assert!(check.update_available);
    assert!(!check.update_required);
    assert_eq!(check.download_url.as_deref(), Some("https://dl.example"));

    let gate = UpdateGate::new(
        fixture.repo.clone(),
        fixture.source.clone(),
        CONFIG_URL.to_string(),
        "0.9.0".to_string(),
    );
    let check = gate.check_for_updates(true).await.unwrap();
    assert!(check.update_available);
    assert!(check.update_required);
}

#[tokio::test]
async fn test_auto_check_throttle() {
    let fixture = TestFixture::new().await;
    fixture.source.set_doc(CONFIG_URL, &config_sheet(true));
    fixture.source.set_doc(
        &doc_url("9"),
        "key\tvalue\nlatest_version\t1.0.0\nmin_version\t1.0.0\n",
    );

    let gate = UpdateGate::new(
        fixture.repo.clone(),
        fixture.source.clone(),
        CONFIG_URL.to_string(),
        "1.0.0".to_string(),
    );

    // Never checked before
    assert!(gate.should_auto_check().await.unwrap());

    // An automatic check stamps the throttle even when nothing is found
    gate.check_for_updates(false).await.unwrap();
    assert!(!gate.should_auto_check().await.unwrap());

    // A manual check leaves the throttle stamp alone
    let stamp_before = fixture.repo.kv_get(LAST_AUTO_CHECK_KEY).await.unwrap();
    gate.check_for_updates(true).await.unwrap();
    let stamp_after = fixture.repo.kv_get(LAST_AUTO_CHECK_KEY).await.unwrap();
    assert_eq!(stamp_before, stamp_after);

    // 25 hours later the window is open again
    let old = (Utc::now() - Duration::hours(25)).to_rfc3339();
    fixture.repo.kv_set(LAST_AUTO_CHECK_KEY, &old).await.unwrap();
    assert!(gate.should_auto_check().await.unwrap());

    // Disabling wins over the elapsed window
    gate.set_auto_check_enabled(false).await.unwrap();
    assert!(!gate.should_auto_check().await.unwrap());
    assert_eq!(
        fixture.repo.kv_get(AUTO_CHECK_ENABLED_KEY).await.unwrap().as_deref(),
        Some("false")
    );
}

#[tokio::test]
async fn test_auto_check_stamps_throttle_on_failure() {
    let fixture = TestFixture::new().await;
    fixture.source.set_doc(CONFIG_URL, &config_sheet(true));
    // No app versions document published

    let gate = UpdateGate::new(
        fixture.repo.clone(),
        fixture.source.clone(),
        CONFIG_URL.to_string(),
        "1.0.0".to_string(),
    );
    assert!(gate.check_for_updates(false).await.is_err());
    assert!(fixture
        .repo
        .kv_get(LAST_AUTO_CHECK_KEY)
        .await
        .unwrap()
        .is_some());
    assert!(!gate.should_auto_check().await.unwrap());
}
