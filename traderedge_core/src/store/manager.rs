//! User data store implementation.

use super::{
    backend::{StorageBackend, StorageEvent, StorageOp, TabId},
    errors::StoreResult,
    keys,
    models::{AppendOutcome, DashboardData, NewUserData, Plan, SubscriptionStatus, UserData, UserDataPatch},
};
use crate::{clock::Clock, payment::PaymentRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Typed access to the locally persisted user record
///
/// Every read goes to the backend, so a write made through another store
/// instance sharing the same backend is visible immediately.
pub struct UserDataStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    tab: TabId,
}

impl UserDataStore {
    /// Create a store over `backend`
    ///
    /// # Arguments
    ///
    /// * `backend` - Shared storage area
    /// * `clock` - Time source for authentication timestamps
    ///
    /// # Returns
    ///
    /// * `UserDataStore` - New store with its own tab identity
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            tab: TabId::new(),
        }
    }

    /// Identity of this store instance on the shared backend
    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    /// Subscribe to change notifications from the shared backend
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.backend.subscribe()
    }

    /// Current user record
    ///
    /// # Returns
    ///
    /// * `Option<UserData>` - The record, or `None` if absent, unreadable or
    ///   corrupt
    pub fn get(&self) -> Option<UserData> {
        let raw = self.read_entry(keys::USER_DATA)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("Stored user record is corrupt, treating as absent: {}", e);
                None
            }
        }
    }

    /// Overwrite the user record and its mirror fields in one commit
    ///
    /// `lastLogin` never moves backwards: if the stored record belongs to the
    /// same user and carries a later `lastLogin`, that value is kept.
    ///
    /// # Errors
    ///
    /// * `StoreError::Serialization` - Record could not be encoded
    /// * `StoreError::Io` - Durable backend failed to persist
    pub fn save(&self, user: &UserData) -> StoreResult<()> {
        let mut user = user.clone();
        if let Some(current) = self.get() {
            if current.user_id == user.user_id && current.last_login > user.last_login {
                user.last_login = current.last_login;
            }
        }
        self.commit(record_ops(&user)?)
    }

    /// Merge `patch` into the current record and save it
    ///
    /// # Returns
    ///
    /// * `StoreResult<bool>` - `false` when no record exists (nothing written)
    pub fn update(&self, patch: UserDataPatch) -> StoreResult<bool> {
        let Some(mut user) = self.get() else {
            return Ok(false);
        };
        patch.apply_to(&mut user);
        self.commit(record_ops(&user)?)?;
        Ok(true)
    }

    /// Remove the record, its mirrors and the user auth token entries
    pub fn clear(&self) -> StoreResult<()> {
        self.commit(
            keys::STORE_OWNED_KEYS
                .iter()
                .map(|key| StorageOp::remove(key))
                .collect(),
        )
    }

    /// Store the user bearer token and stamp the authentication time
    pub fn set_auth_token(&self, token: &str) -> StoreResult<()> {
        let now = self.clock.now();
        self.commit(vec![
            StorageOp::set(keys::AUTH_TOKEN, token),
            StorageOp::set(keys::AUTH_TIMESTAMP, now.to_rfc3339()),
        ])
    }

    /// Bearer token of the user session, if any
    pub fn auth_token(&self) -> Option<String> {
        self.read_entry(keys::AUTH_TOKEN)
    }

    /// Last time the user token was set or refreshed
    pub fn auth_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read_timestamp(keys::AUTH_TIMESTAMP)
    }

    /// Move the authentication timestamp to now
    pub fn touch_auth_timestamp(&self) -> StoreResult<()> {
        let now = self.clock.now();
        self.commit(vec![StorageOp::set(keys::AUTH_TIMESTAMP, now.to_rfc3339())])
    }

    /// Whether a user token AND a user record are both present
    pub fn is_authenticated(&self) -> bool {
        self.auth_token().is_some() && self.get().is_some()
    }

    /// Advance `lastLogin` to `at`
    ///
    /// # Returns
    ///
    /// * `StoreResult<bool>` - `false` when no record exists or `at` is not
    ///   later than the stored value
    pub fn touch_last_login(&self, at: DateTime<Utc>) -> StoreResult<bool> {
        let Some(mut user) = self.get() else {
            return Ok(false);
        };
        if at <= user.last_login {
            return Ok(false);
        }
        user.last_login = at;
        self.commit(record_ops(&user)?)?;
        Ok(true)
    }

    /// Append a payment to the history unless its `paymentId` is already there
    ///
    /// # Returns
    ///
    /// * `StoreResult<Option<AppendOutcome>>` - `None` when no record exists
    pub fn add_payment_record(&self, record: PaymentRecord) -> StoreResult<Option<AppendOutcome>> {
        let Some(mut user) = self.get() else {
            return Ok(None);
        };
        if user.payment(&record.payment_id).is_some() {
            return Ok(Some(AppendOutcome::AlreadyRecorded));
        }
        user.payment_history.push(record);
        self.commit(record_ops(&user)?)?;
        Ok(Some(AppendOutcome::Appended))
    }

    /// Apply a verified payment: append it to the history (idempotently), set
    /// `plan` and mark the subscription active, all in a single save
    ///
    /// # Returns
    ///
    /// * `StoreResult<Option<AppendOutcome>>` - `None` when no record exists
    pub fn record_verified_payment(
        &self,
        record: PaymentRecord,
        plan: Plan,
    ) -> StoreResult<Option<AppendOutcome>> {
        let Some(mut user) = self.get() else {
            return Ok(None);
        };

        let outcome = if user.payment(&record.payment_id).is_some() {
            AppendOutcome::AlreadyRecorded
        } else {
            user.payment_history.push(record);
            AppendOutcome::Appended
        };
        user.plan = plan;
        user.subscription_status = SubscriptionStatus::Active;

        self.commit(record_ops(&user)?)?;
        Ok(Some(outcome))
    }

    /// Build a fresh record with default plan, status and dashboard, save it
    /// and return it
    pub fn create_user_data(&self, new_user: NewUserData) -> StoreResult<UserData> {
        let now = self.clock.now();
        let user = UserData {
            user_id: new_user
                .user_id
                .unwrap_or_else(|| format!("user_{}", Uuid::new_v4().simple())),
            username: new_user.username,
            email: new_user.email,
            plan: new_user.plan.unwrap_or_default(),
            subscription_status: new_user.subscription_status.unwrap_or_default(),
            join_date: now,
            last_login: now,
            dashboard_data: DashboardData::default(),
            payment_history: Vec::new(),
            profile_data: new_user
                .profile_data
                .unwrap_or_else(|| Value::Object(Default::default())),
        };
        self.commit(record_ops(&user)?)?;
        Ok(user)
    }

    /// Append a trade to the dashboard
    ///
    /// # Returns
    ///
    /// * `StoreResult<bool>` - `false` when no record exists
    pub fn add_trade(&self, trade: Value) -> StoreResult<bool> {
        let Some(mut user) = self.get() else {
            return Ok(false);
        };
        user.dashboard_data.trades.push(trade);
        self.commit(record_ops(&user)?)?;
        Ok(true)
    }

    /// Plan of the current record, `basic` when there is none
    pub fn user_plan(&self) -> Plan {
        self.get().map(|u| u.plan).unwrap_or_default()
    }

    /// Whether the current plan includes priority support
    pub fn has_priority_support(&self) -> bool {
        self.user_plan().has_priority_support()
    }

    /// Pretty-printed JSON backup of the current record
    pub fn export_json(&self) -> Option<String> {
        let user = self.get()?;
        match serde_json::to_string_pretty(&user) {
            Ok(json) => Some(json),
            Err(e) => {
                log::error!("Failed to export user data: {}", e);
                None
            }
        }
    }

    /// Restore a record from a JSON backup
    ///
    /// # Returns
    ///
    /// * `bool` - `false` if the payload is not a valid record or could not
    ///   be written
    pub fn import_json(&self, data: &str) -> bool {
        let user: UserData = match serde_json::from_str(data) {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Rejected user data import: {}", e);
                return false;
            }
        };
        match self.save(&user) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save imported user data: {}", e);
                false
            }
        }
    }

    /// Mirrored plan, readable without parsing the record
    pub fn mirrored_plan(&self) -> Option<Plan> {
        self.read_entry(keys::MIRROR_PLAN)?.parse().ok()
    }

    /// Mirrored user id
    pub fn mirrored_user_id(&self) -> Option<String> {
        self.read_entry(keys::MIRROR_USER_ID)
    }

    /// Mirrored email address
    pub fn mirrored_email(&self) -> Option<String> {
        self.read_entry(keys::MIRROR_EMAIL)
    }

    /// Raw entry read; backend failures degrade to `None`
    pub(crate) fn read_entry(&self, key: &str) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to read storage key {}: {}", key, e);
                None
            }
        }
    }

    /// Raw entry read parsed as an RFC 3339 timestamp
    pub(crate) fn read_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.read_entry(key)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                log::warn!("Ignoring malformed timestamp under {}: {}", key, e);
                None
            }
        }
    }

    pub(crate) fn commit(&self, ops: Vec<StorageOp>) -> StoreResult<()> {
        self.backend.commit(self.tab, ops)
    }
}

/// Ops writing the record and its mirrors.
fn record_ops(user: &UserData) -> StoreResult<Vec<StorageOp>> {
    let values = [
        serde_json::to_string(user)?,
        user.plan.as_str().to_string(),
        user.user_id.clone(),
        user.email.clone(),
    ];
    Ok(keys::RECORD_KEYS
        .iter()
        .zip(values)
        .map(|(key, value)| StorageOp::set(key, value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStorage;
    use chrono::{Duration, TimeZone};

    fn setup() -> (UserDataStore, Arc<MemoryStorage>, Arc<ManualClock>) {
        let backend = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = UserDataStore::new(backend.clone(), clock.clone());
        (store, backend, clock)
    }

    fn new_user() -> NewUserData {
        NewUserData {
            user_id: Some("user_42".to_string()),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_applies_defaults_and_mirrors() {
        let (store, _, clock) = setup();
        let user = store.create_user_data(new_user()).unwrap();

        assert_eq!(user.plan, Plan::Basic);
        assert_eq!(user.subscription_status, SubscriptionStatus::Trial);
        assert_eq!(user.join_date, clock.now());
        assert_eq!(store.get(), Some(user));
        assert_eq!(store.mirrored_plan(), Some(Plan::Basic));
        assert_eq!(store.mirrored_user_id().as_deref(), Some("user_42"));
        assert_eq!(store.mirrored_email().as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_generated_user_id() {
        let (store, _, _) = setup();
        let user = store
            .create_user_data(NewUserData {
                username: "bob".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(user.user_id.starts_with("user_"));
    }

    #[test]
    fn test_update_without_record_is_noop() {
        let (store, backend, _) = setup();
        let applied = store
            .update(UserDataPatch {
                plan: Some(Plan::Pro),
                ..Default::default()
            })
            .unwrap();
        assert!(!applied);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_update_rewrites_mirrors() {
        let (store, _, _) = setup();
        store.create_user_data(new_user()).unwrap();

        store
            .update(UserDataPatch {
                plan: Some(Plan::Enterprise),
                email: Some("new@example.com".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.mirrored_plan(), Some(Plan::Enterprise));
        assert_eq!(store.mirrored_email().as_deref(), Some("new@example.com"));
        assert!(store.has_priority_support());
    }

    #[test]
    fn test_touch_last_login_is_monotonic() {
        let (store, _, clock) = setup();
        let user = store.create_user_data(new_user()).unwrap();

        assert!(!store.touch_last_login(user.last_login - Duration::hours(1)).unwrap());
        assert_eq!(store.get().unwrap().last_login, user.last_login);

        clock.advance(Duration::minutes(5));
        assert!(store.touch_last_login(clock.now()).unwrap());
        assert_eq!(store.get().unwrap().last_login, clock.now());
    }

    #[test]
    fn test_save_keeps_later_last_login() {
        let (store, _, clock) = setup();
        let stale = store.create_user_data(new_user()).unwrap();

        clock.advance(Duration::hours(2));
        store.touch_last_login(clock.now()).unwrap();

        store.save(&stale).unwrap();
        assert_eq!(store.get().unwrap().last_login, clock.now());
    }

    #[test]
    fn test_add_trade() {
        let (store, _, _) = setup();
        assert!(!store.add_trade(serde_json::json!({"pair": "EURUSD"})).unwrap());

        store.create_user_data(new_user()).unwrap();
        assert!(store.add_trade(serde_json::json!({"pair": "EURUSD"})).unwrap());
        assert_eq!(store.get().unwrap().dashboard_data.trades.len(), 1);
    }

    #[test]
    fn test_user_plan_defaults_to_basic() {
        let (store, _, _) = setup();
        assert_eq!(store.user_plan(), Plan::Basic);
        assert!(!store.has_priority_support());
    }

    #[test]
    fn test_export_import_roundtrip_through_fresh_backend() {
        let (store, _, _) = setup();
        store.create_user_data(new_user()).unwrap();
        let backup = store.export_json().unwrap();

        let (other, _, _) = setup();
        assert!(other.import_json(&backup));
        assert_eq!(other.get(), store.get());
        assert!(!other.import_json("[1, 2, 3]"));
    }

    #[test]
    fn test_auth_token_stamps_time() {
        let (store, _, clock) = setup();
        store.set_auth_token("tok").unwrap();
        assert_eq!(store.auth_token().as_deref(), Some("tok"));
        assert_eq!(store.auth_timestamp(), Some(clock.now()));

        clock.advance(Duration::minutes(30));
        store.touch_auth_timestamp().unwrap();
        assert_eq!(store.auth_timestamp(), Some(clock.now()));
    }
}
