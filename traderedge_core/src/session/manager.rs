//! Session manager implementation.

use super::models::{AuthState, Principal, StaffRole, UserType};
use crate::{
    clock::Clock,
    config::SessionConfig,
    identity::IdentitySession,
    store::{StorageOp, StoreResult, UserData, UserDataStore, keys},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

const FLAG_SET: &str = "true";

/// Single authority for who is logged in
///
/// Holds no state of its own; every answer is computed from the shared store,
/// so several managers over one backend (one per tab) always agree.
pub struct SessionManager {
    store: Arc<UserDataStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager
    ///
    /// # Arguments
    ///
    /// * `store` - User data store of this tab
    /// * `clock` - Time source for login, refresh and expiry
    /// * `config` - Session lifetime, poll interval and staff PINs
    pub fn new(store: Arc<UserDataStore>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<UserDataStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Compute the current authentication state
    ///
    /// Staff sessions win over a user session present at the same time
    /// (administrator first, then customer service). When the user session is
    /// current its `lastLogin` is moved to now.
    pub fn check_auth_state(&self) -> AuthState {
        let mut state = self.peek_auth_state();
        if state.user_type == Some(UserType::User) {
            let now = self.clock.now();
            match self.store.touch_last_login(now) {
                Ok(true) => {
                    if let Some(Principal::User(user)) = state.user.as_mut() {
                        user.last_login = now;
                    }
                }
                Ok(false) => {}
                Err(e) => log::warn!("Failed to update last login: {}", e),
            }
        }
        state
    }

    /// Same as [`check_auth_state`](Self::check_auth_state) without writing
    /// anything
    pub fn peek_auth_state(&self) -> AuthState {
        for role in StaffRole::ALL {
            if let Some(state) = self.staff_state(role) {
                return state;
            }
        }

        match (self.store.auth_token(), self.store.get()) {
            (Some(token), Some(user)) => AuthState::user(user, token),
            _ => AuthState::unauthenticated(),
        }
    }

    /// Establish a user session
    ///
    /// The record is saved before the token is written, so any reader that
    /// sees the token also sees the record.
    ///
    /// # Errors
    ///
    /// * `StoreError` - The backend failed to persist
    pub fn login_user(&self, user: &UserData, token: &str) -> StoreResult<()> {
        let now = self.clock.now();
        let mut user = user.clone();
        if user.last_login < now {
            user.last_login = now;
        }
        self.store.save(&user)?;

        let stamp = now.to_rfc3339();
        self.store.commit(vec![
            StorageOp::set(keys::AUTH_TOKEN, token),
            StorageOp::set(keys::AUTH_TIMESTAMP, stamp.as_str()),
            StorageOp::set(keys::USER_AUTHENTICATED, FLAG_SET),
            StorageOp::set(keys::USER_LOGIN_TIME, stamp),
        ])?;

        log::info!("User {} logged in", user.user_id);
        Ok(())
    }

    /// Establish a user session from an Identity Service login
    ///
    /// When the stored record belongs to the same user, its payment history,
    /// dashboard, profile and subscription status are kept; name, email and
    /// plan are taken from the identity profile.
    ///
    /// # Returns
    ///
    /// * `StoreResult<UserData>` - The record now stored
    pub fn login_identity(&self, session: &IdentitySession) -> StoreResult<UserData> {
        let profile = &session.user;
        let now = self.clock.now();

        let user = match self.store.get() {
            Some(mut existing) if existing.user_id == profile.id => {
                existing.username = profile.name.clone();
                existing.email = profile.email.clone();
                existing.plan = profile.plan();
                existing
            }
            _ => UserData {
                user_id: profile.id.clone(),
                username: profile.name.clone(),
                email: profile.email.clone(),
                plan: profile.plan(),
                subscription_status: Default::default(),
                join_date: now,
                last_login: now,
                dashboard_data: Default::default(),
                payment_history: Vec::new(),
                profile_data: serde_json::Value::Object(Default::default()),
            },
        };

        self.login_user(&user, &session.access_token)?;
        Ok(user)
    }

    /// Log in a staff role with its PIN
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the PIN matched and the session was written;
    ///   nothing is written otherwise
    pub fn login_admin(&self, role: StaffRole, pin: &str) -> bool {
        let Some(expected) = self.config.role_pins.pin_for(role) else {
            log::warn!("Rejected {} login: no PIN configured for this role", role);
            return false;
        };

        if !bool::from(pin.as_bytes().ct_eq(expected.as_bytes())) {
            log::warn!("Rejected {} login: PIN mismatch", role);
            return false;
        }

        let keys = role.keys();
        let now = self.clock.now().to_rfc3339();
        let token = format!("staff_{}", Uuid::new_v4().simple());
        let result = self.store.commit(vec![
            StorageOp::set(keys.token, token),
            StorageOp::set(keys.username, role.as_str()),
            StorageOp::set(keys.user_type, role.as_str()),
            StorageOp::set(keys.login_time, now.as_str()),
            StorageOp::set(keys.refresh_time, now),
            StorageOp::set(keys.authenticated, FLAG_SET),
        ]);

        match result {
            Ok(()) => {
                log::info!("Staff session established for {}", role);
                true
            }
            Err(e) => {
                log::error!("Failed to persist {} session: {}", role, e);
                false
            }
        }
    }

    /// Purge the user session, the user record and its mirrors
    pub fn logout_user(&self) -> StoreResult<()> {
        let ops = keys::STORE_OWNED_KEYS
            .iter()
            .chain([keys::USER_AUTHENTICATED, keys::USER_LOGIN_TIME].iter())
            .map(|key| StorageOp::remove(key))
            .collect();
        self.store.commit(ops)?;
        log::info!("User logged out");
        Ok(())
    }

    /// Remove the administrator session only
    pub fn logout_admin(&self) -> StoreResult<()> {
        self.logout_staff(StaffRole::Admin)
    }

    /// Remove the customer-service session only
    pub fn logout_customer_service(&self) -> StoreResult<()> {
        self.logout_staff(StaffRole::CustomerService)
    }

    /// Log out the given principal kind, leaving the others untouched
    pub fn logout(&self, user_type: UserType) -> StoreResult<()> {
        match user_type.staff_role() {
            Some(role) => self.logout_staff(role),
            None => self.logout_user(),
        }
    }

    /// Whether the current principal's session is still within its lifetime
    pub fn is_session_valid(&self) -> bool {
        self.peek_auth_state()
            .user_type
            .is_some_and(|user_type| self.is_namespace_valid(user_type))
    }

    /// Whether the session of `user_type` is within its lifetime
    ///
    /// Elapsed time is measured from the later of the refresh and login
    /// timestamps. With neither present the session is invalid.
    pub fn is_namespace_valid(&self, user_type: UserType) -> bool {
        let (login_key, refresh_key) = match user_type.staff_role() {
            Some(role) => (role.keys().login_time, role.keys().refresh_time),
            None => (keys::USER_LOGIN_TIME, keys::AUTH_TIMESTAMP),
        };

        let latest = [
            self.store.read_timestamp(login_key),
            self.store.read_timestamp(refresh_key),
        ]
        .into_iter()
        .flatten()
        .max();

        match latest {
            Some(at) => self.elapsed_since(at) < self.config.lifetime,
            None => false,
        }
    }

    /// Extend the current session by moving its refresh timestamp to now
    ///
    /// # Returns
    ///
    /// * `bool` - `false` when nobody is logged in or the write failed
    pub fn refresh_session(&self) -> bool {
        let state = self.peek_auth_state();
        let Some(user_type) = state.user_type else {
            return false;
        };

        let now = self.clock.now();
        let result = match user_type.staff_role() {
            Some(role) => self
                .store
                .commit(vec![StorageOp::set(role.keys().refresh_time, now.to_rfc3339())]),
            None => self
                .store
                .touch_auth_timestamp()
                .and_then(|()| self.store.touch_last_login(now).map(|_| ())),
        };

        match result {
            Ok(()) => {
                log::debug!("Refreshed {} session", user_type);
                true
            }
            Err(e) => {
                log::error!("Failed to refresh {} session: {}", user_type, e);
                false
            }
        }
    }

    fn staff_state(&self, role: StaffRole) -> Option<AuthState> {
        let keys = role.keys();
        let token = self.store.read_entry(keys.token)?;
        if self.store.read_entry(keys.authenticated).as_deref() != Some(FLAG_SET) {
            return None;
        }
        let tagged = self.store.read_entry(keys.user_type)?.parse::<UserType>().ok()?;
        if tagged != role.user_type() {
            log::warn!("Ignoring {} session tagged as {}", role, tagged);
            return None;
        }
        let username = self
            .store
            .read_entry(keys.username)
            .unwrap_or_else(|| role.as_str().to_string());
        Some(AuthState::staff(role, username, token))
    }

    fn logout_staff(&self, role: StaffRole) -> StoreResult<()> {
        self.store
            .commit(role.keys().all().iter().map(|key| StorageOp::remove(key)).collect())?;
        log::info!("{} logged out", role);
        Ok(())
    }

    fn elapsed_since(&self, at: DateTime<Utc>) -> chrono::Duration {
        self.clock.now().signed_duration_since(at)
    }
}
