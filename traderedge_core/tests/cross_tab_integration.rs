//! Integration tests for cross-tab synchronization and the auto-logout loop.
//!
//! Several supervisors share one storage backend the way browser tabs share a
//! profile's storage area.

use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use traderedge_core::clock::ManualClock;
use traderedge_core::config::{RolePins, SessionConfig};
use traderedge_core::session::{
    SessionEvent, SessionManager, SessionSupervisor, StaffRole, UserType,
};
use traderedge_core::store::{
    FileStorage, MemoryStorage, NewUserData, StorageBackend, UserDataStore,
};
use uuid::Uuid;

const ADMIN_PIN: &str = "975310";

/// Helper to open one "tab" on a shared backend
fn open_tab(backend: Arc<dyn StorageBackend>, clock: Arc<ManualClock>) -> Arc<SessionSupervisor> {
    let store = Arc::new(UserDataStore::new(backend, clock.clone()));
    let config = SessionConfig {
        poll_interval: Duration::from_secs(60),
        role_pins: RolePins {
            admin: Some(ADMIN_PIN.to_string()),
            customer_service: None,
        },
        ..Default::default()
    };
    Arc::new(SessionSupervisor::new(Arc::new(SessionManager::new(
        store, clock, config,
    ))))
}

fn shared_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap(),
    ))
}

#[tokio::test]
async fn test_login_in_one_tab_reaches_the_other() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let clock = shared_clock();
    let tab_a = open_tab(backend.clone(), clock.clone());
    let tab_b = open_tab(backend, clock);

    let loop_b = tab_b.setup_auto_logout();
    let mut state_b = tab_b.watch_state();

    assert!(tab_a.login_admin(StaffRole::Admin, ADMIN_PIN));
    timeout(Duration::from_secs(5), state_b.changed())
        .await
        .expect("Tab B never saw the login")
        .expect("State channel closed");
    assert_eq!(state_b.borrow().user_type, Some(UserType::Admin));

    tab_a.logout(UserType::Admin).unwrap();
    timeout(Duration::from_secs(5), state_b.changed())
        .await
        .expect("Tab B never saw the logout")
        .expect("State channel closed");
    assert!(!state_b.borrow().is_authenticated);

    loop_b.abort();
}

#[tokio::test]
async fn test_user_login_published_to_event_subscribers() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let clock = shared_clock();
    let tab_a = open_tab(backend.clone(), clock.clone());
    let tab_b = open_tab(backend, clock);

    let loop_b = tab_b.setup_auto_logout();
    let mut events_b = tab_b.subscribe();

    let user = tab_a
        .manager()
        .store()
        .create_user_data(NewUserData {
            username: "dennis".to_string(),
            email: "dennis@example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
    tab_a.login_user(&user, "user-token").unwrap();

    // The record write alone is not a login; wait for the state with a token
    let state = loop {
        let event = timeout(Duration::from_secs(5), events_b.recv())
            .await
            .expect("No event reached tab B")
            .expect("Event channel closed");
        if let SessionEvent::StateChanged(state) = event {
            if state.is_authenticated {
                break state;
            }
        }
    };
    assert_eq!(state.user_type, Some(UserType::User));
    assert_eq!(state.token.as_deref(), Some("user-token"));

    loop_b.abort();
}

#[tokio::test(start_paused = true)]
async fn test_login_published_without_waiting_for_poll() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let tab = open_tab(backend, shared_clock());
    let handle = tab.setup_auto_logout();
    let mut events = tab.subscribe();

    assert!(tab.login_admin(StaffRole::Admin, ADMIN_PIN));
    assert_eq!(tab.current().user_type, Some(UserType::Admin));
    assert!(matches!(events.try_recv(), Ok(SessionEvent::StateChanged(_))));

    tab.logout(UserType::Admin).unwrap();
    assert!(!tab.current().is_authenticated);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::StateChanged(_))));

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_auto_logout_after_lifetime() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let clock = shared_clock();
    let tab = open_tab(backend, clock.clone());
    assert!(tab.login_admin(StaffRole::Admin, ADMIN_PIN));

    let mut events = tab.subscribe();
    let handle = tab.setup_auto_logout();

    clock.advance(chrono::Duration::hours(24) + chrono::Duration::minutes(1));

    let event = timeout(Duration::from_secs(120), events.recv())
        .await
        .expect("Poll never fired")
        .expect("Event channel closed");
    assert_eq!(event, SessionEvent::Expired(UserType::Admin));
    assert!(!tab.current().is_authenticated);
    assert!(!tab.manager().is_namespace_valid(UserType::Admin));

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_valid_session_survives_polls() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let clock = shared_clock();
    let tab = open_tab(backend, clock.clone());
    assert!(tab.login_admin(StaffRole::Admin, ADMIN_PIN));

    let mut events = tab.subscribe();
    let handle = tab.setup_auto_logout();

    clock.advance(chrono::Duration::hours(1));
    tokio::time::sleep(Duration::from_secs(60 * 5 + 1)).await;

    assert!(events.try_recv().is_err());
    assert_eq!(tab.current().user_type, Some(UserType::Admin));

    handle.abort();
}

fn temp_state_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("traderedge_tabs_{}", Uuid::new_v4()))
        .join("state.json")
}

#[test]
fn test_staff_login_in_stale_process_keeps_user_session() {
    let path = temp_state_path();
    let clock = shared_clock();
    let watcher = open_tab(Arc::new(FileStorage::open(&path).unwrap()), clock.clone());
    let cli = open_tab(Arc::new(FileStorage::open(&path).unwrap()), clock.clone());

    let user = cli
        .manager()
        .store()
        .create_user_data(NewUserData {
            username: "brian".to_string(),
            email: "brian@example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
    cli.login_user(&user, "user-token").unwrap();
    assert_eq!(watcher.recompute().user_type, Some(UserType::User));

    assert!(watcher.login_admin(StaffRole::Admin, ADMIN_PIN));

    let fresh = open_tab(Arc::new(FileStorage::open(&path).unwrap()), clock);
    let store = fresh.manager().store();
    assert_eq!(store.get(), Some(user));
    assert_eq!(store.auth_token().as_deref(), Some("user-token"));
    assert_eq!(fresh.recompute().user_type, Some(UserType::Admin));

    fresh.logout(UserType::Admin).unwrap();
    assert_eq!(watcher.recompute().user_type, Some(UserType::User));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_watching_process_sees_other_process_changes() {
    let path = temp_state_path();
    let clock = shared_clock();
    let watcher_storage = Arc::new(FileStorage::open(&path).unwrap());
    let watcher = open_tab(watcher_storage.clone(), clock.clone());
    let cli = open_tab(Arc::new(FileStorage::open(&path).unwrap()), clock);

    let loop_handle = watcher.setup_auto_logout();
    let file_handle = watcher_storage.watch_changes(Duration::from_millis(20));
    let mut state = watcher.watch_state();

    assert!(cli.login_admin(StaffRole::Admin, ADMIN_PIN));
    timeout(Duration::from_secs(5), state.changed())
        .await
        .expect("Watcher never saw the login")
        .expect("State channel closed");
    assert_eq!(state.borrow().user_type, Some(UserType::Admin));

    cli.logout(UserType::Admin).unwrap();
    timeout(Duration::from_secs(5), state.changed())
        .await
        .expect("Watcher never saw the logout")
        .expect("State channel closed");
    assert!(!state.borrow().is_authenticated);

    file_handle.abort();
    loop_handle.abort();
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
