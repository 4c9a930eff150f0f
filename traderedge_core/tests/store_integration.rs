//! Integration tests for the persistent store.
//!
//! Covers corrupt-data resilience, mirror coherence, multi-tab visibility and
//! durable file storage.

use chrono::{Duration, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use traderedge_core::clock::{Clock, ManualClock};
use traderedge_core::payment::{PaymentMethod, PaymentRecord, PaymentStatus};
use traderedge_core::store::{
    AppendOutcome, FileStorage, MemoryStorage, NewUserData, Plan, StorageBackend,
    SubscriptionStatus, UserDataPatch, UserDataStore, keys,
};
use uuid::Uuid;

fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap(),
    ))
}

/// Temp path unique to one test
fn temp_state_path() -> PathBuf {
    std::env::temp_dir().join(format!("traderedge_store_{}.json", Uuid::new_v4()))
}

fn remove_state(path: &Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("json.lock"));
}

fn new_user(store: &UserDataStore) -> traderedge_core::store::UserData {
    store
        .create_user_data(NewUserData {
            username: "grace".to_string(),
            email: "grace@example.com".to_string(),
            ..Default::default()
        })
        .expect("Failed to create user")
}

fn payment(id: &str) -> PaymentRecord {
    PaymentRecord {
        payment_id: id.to_string(),
        method: PaymentMethod::Card,
        amount: 49.0,
        currency: "USD".to_string(),
        plan: Plan::Basic,
        status: PaymentStatus::Completed,
        timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        reference: None,
    }
}

#[test]
fn test_corrupt_record_reads_as_absent() {
    let backend = Arc::new(MemoryStorage::new());
    backend.insert_raw(keys::USER_DATA, "{not json").unwrap();
    backend.insert_raw(keys::AUTH_TOKEN, "token").unwrap();

    let store = UserDataStore::new(backend, test_clock());
    assert!(store.get().is_none());
    assert!(!store.is_authenticated());
    assert!(!store.update(UserDataPatch::default()).unwrap());
}

#[test]
fn test_token_and_record_both_required() {
    let store = UserDataStore::new(Arc::new(MemoryStorage::new()), test_clock());
    store.set_auth_token("token").unwrap();
    assert!(!store.is_authenticated());

    new_user(&store);
    assert!(store.is_authenticated());

    store.clear().unwrap();
    assert!(!store.is_authenticated());
    assert!(store.auth_token().is_none());
}

#[test]
fn test_mirrors_follow_every_write_path() {
    let store = UserDataStore::new(Arc::new(MemoryStorage::new()), test_clock());
    let user = new_user(&store);
    assert_eq!(store.mirrored_user_id(), Some(user.user_id.clone()));
    assert_eq!(store.mirrored_plan(), Some(Plan::Basic));

    store
        .update(UserDataPatch {
            email: Some("grace@navy.mil".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(store.mirrored_email().as_deref(), Some("grace@navy.mil"));

    store
        .record_verified_payment(payment("pi_1"), Plan::Enterprise)
        .unwrap();
    assert_eq!(store.mirrored_plan(), Some(Plan::Enterprise));

    store.clear().unwrap();
    assert!(store.mirrored_plan().is_none());
    assert!(store.mirrored_email().is_none());
}

#[test]
fn test_mirror_is_current_when_change_is_announced() {
    let backend = Arc::new(MemoryStorage::new());
    let writer = UserDataStore::new(backend.clone(), test_clock());
    let reader = UserDataStore::new(backend.clone(), test_clock());
    new_user(&writer);

    let mut events = backend.subscribe();
    writer
        .update(UserDataPatch {
            plan: Some(Plan::Pro),
            ..Default::default()
        })
        .unwrap();

    let first = events.try_recv().expect("Expected a change event");
    assert_eq!(first.origin, writer.tab_id());
    assert_eq!(reader.mirrored_plan(), Some(Plan::Pro));
    assert_eq!(reader.get().unwrap().plan, Plan::Pro);
}

#[test]
fn test_unchanged_write_emits_nothing() {
    let backend = Arc::new(MemoryStorage::new());
    let store = UserDataStore::new(backend.clone(), test_clock());
    let user = new_user(&store);

    let mut events = backend.subscribe();
    store.save(&user).unwrap();
    assert!(events.try_recv().is_err());
}

#[test]
fn test_last_login_never_moves_backwards() {
    let clock = test_clock();
    let store = UserDataStore::new(Arc::new(MemoryStorage::new()), clock.clone());
    let user = new_user(&store);

    clock.advance(Duration::hours(1));
    assert!(store.touch_last_login(clock.now()).unwrap());

    // A stale copy must not roll lastLogin back
    store.save(&user).unwrap();
    assert_eq!(store.get().unwrap().last_login, clock.now());
    assert!(!store.touch_last_login(clock.now() - Duration::minutes(5)).unwrap());
}

#[test]
fn test_payment_append_is_idempotent() {
    let store = UserDataStore::new(Arc::new(MemoryStorage::new()), test_clock());
    assert_eq!(store.add_payment_record(payment("pi_1")).unwrap(), None);

    new_user(&store);
    assert_eq!(
        store.add_payment_record(payment("pi_1")).unwrap(),
        Some(AppendOutcome::Appended)
    );
    assert_eq!(
        store.add_payment_record(payment("pi_1")).unwrap(),
        Some(AppendOutcome::AlreadyRecorded)
    );
    assert_eq!(store.get().unwrap().payment_history.len(), 1);
}

#[test]
fn test_verified_payment_applies_plan_and_status_together() {
    let store = UserDataStore::new(Arc::new(MemoryStorage::new()), test_clock());
    new_user(&store);

    store
        .record_verified_payment(payment("pi_9"), Plan::Pro)
        .unwrap();
    let user = store.get().unwrap();
    assert_eq!(user.plan, Plan::Pro);
    assert_eq!(user.subscription_status, SubscriptionStatus::Active);
    assert_eq!(user.payment_history.len(), 1);
}

#[test]
fn test_export_import_roundtrip_via_second_store() {
    let clock = test_clock();
    let source = UserDataStore::new(Arc::new(MemoryStorage::new()), clock.clone());
    new_user(&source);
    source.add_trade(serde_json::json!({"symbol": "EURUSD", "pnl": 12.5})).unwrap();
    let backup = source.export_json().expect("Export failed");

    let target = UserDataStore::new(Arc::new(MemoryStorage::new()), clock);
    assert!(!target.import_json("{\"userId\": 7}"));
    assert!(target.import_json(&backup));
    assert_eq!(target.get(), source.get());
}

#[test]
fn test_file_storage_survives_reopen() {
    let path = temp_state_path();
    let clock = test_clock();

    let user = {
        let backend = Arc::new(FileStorage::open(&path).expect("Failed to open state file"));
        let store = UserDataStore::new(backend, clock.clone());
        store.set_auth_token("persisted").unwrap();
        new_user(&store)
    };

    let backend = Arc::new(FileStorage::open(&path).expect("Failed to reopen state file"));
    let store = UserDataStore::new(backend, clock);
    assert_eq!(store.get(), Some(user));
    assert!(store.is_authenticated());

    remove_state(&path);
}

#[test]
fn test_corrupt_state_file_degrades_to_empty() {
    let path = temp_state_path();
    std::fs::write(&path, "\u{0}\u{0}garbage").unwrap();

    let backend = Arc::new(FileStorage::open(&path).expect("Open should not fail"));
    let store = UserDataStore::new(backend, test_clock());
    assert!(store.get().is_none());

    new_user(&store);
    assert!(store.get().is_some());

    remove_state(&path);
}

#[test]
fn test_file_storage_shared_by_two_processes() {
    let path = temp_state_path();
    let clock = test_clock();
    let long_lived = UserDataStore::new(
        Arc::new(FileStorage::open(&path).expect("Failed to open state file")),
        clock.clone(),
    );
    let short_lived = UserDataStore::new(
        Arc::new(FileStorage::open(&path).expect("Failed to open state file")),
        clock,
    );

    let user = new_user(&short_lived);
    short_lived.set_auth_token("fresh-token").unwrap();
    assert_eq!(long_lived.get(), Some(user));
    assert!(long_lived.is_authenticated());

    // A write through the older instance must not roll back the newer one
    long_lived.add_payment_record(payment("pi_shared")).unwrap();
    let record = short_lived.get().expect("Record lost");
    assert_eq!(record.payment_history.len(), 1);
    assert_eq!(short_lived.auth_token().as_deref(), Some("fresh-token"));

    short_lived.clear().unwrap();
    assert!(long_lived.get().is_none());
    long_lived.touch_auth_timestamp().unwrap();
    assert!(short_lived.get().is_none());
    assert!(short_lived.auth_token().is_none());

    remove_state(&path);
}
