//! Host-facing session supervisor: state publication, cross-tab sync and the
//! auto-logout loop.

use super::{
    manager::SessionManager,
    models::{AuthState, StaffRole, UserType},
};
use crate::{
    identity::IdentitySession,
    store::{Namespace, StorageEvent, StoreResult, UserData},
};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification published to the host
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The externally visible state changed
    StateChanged(AuthState),
    /// A session of this kind ran past its lifetime and was logged out; the
    /// host should reload its authentication view
    Expired(UserType),
}

/// Wraps a [`SessionManager`] for one tab and keeps subscribers current
///
/// Logins and logouts made through the supervisor are published immediately.
/// The poll loop started by [`setup_auto_logout`](Self::setup_auto_logout) is
/// only a backstop for expiry and for changes made by other tabs.
pub struct SessionSupervisor {
    manager: Arc<SessionManager>,
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionSupervisor {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let (state, _) = watch::channel(manager.check_auth_state());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            manager,
            state,
            events,
        }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Last published state
    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn login_user(&self, user: &UserData, token: &str) -> StoreResult<AuthState> {
        self.manager.login_user(user, token)?;
        Ok(self.recompute())
    }

    pub fn login_identity(&self, session: &IdentitySession) -> StoreResult<AuthState> {
        self.manager.login_identity(session)?;
        Ok(self.recompute())
    }

    pub fn login_admin(&self, role: StaffRole, pin: &str) -> bool {
        let accepted = self.manager.login_admin(role, pin);
        if accepted {
            self.recompute();
        }
        accepted
    }

    pub fn logout(&self, user_type: UserType) -> StoreResult<AuthState> {
        self.manager.logout(user_type)?;
        Ok(self.recompute())
    }

    /// Recompute the state from storage and publish it if it changed
    pub fn recompute(&self) -> AuthState {
        let state = self.manager.peek_auth_state();
        self.publish(state.clone());
        state
    }

    /// One poll of the auto-logout loop
    ///
    /// A valid session is refreshed. A session that is still authenticated
    /// but past its lifetime is logged out and [`SessionEvent::Expired`] is
    /// emitted.
    ///
    /// # Returns
    ///
    /// * `Option<UserType>` - The kind that was force-logged-out, if any
    pub fn tick(&self) -> Option<UserType> {
        let state = self.manager.peek_auth_state();
        let Some(user_type) = state.user_type else {
            self.publish(state);
            return None;
        };

        if self.manager.is_namespace_valid(user_type) {
            self.manager.refresh_session();
            return None;
        }

        log::warn!("{} session expired, logging out", user_type);
        if let Err(e) = self.manager.logout(user_type) {
            log::error!("Failed to clear expired {} session: {}", user_type, e);
            return None;
        }
        let _ = self.events.send(SessionEvent::Expired(user_type));
        self.recompute();
        Some(user_type)
    }

    /// React to a change made through the shared backend
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the event came from another tab and touched a
    ///   session namespace, in which case the state was recomputed
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.origin == self.manager.store().tab_id() {
            return false;
        }
        let Some(namespace) = Namespace::of_key(&event.key) else {
            return false;
        };
        log::debug!("Storage change on {} ({:?}) from tab {}", event.key, namespace, event.origin);
        self.recompute();
        true
    }

    /// Spawn the auto-logout loop
    ///
    /// The loop polls every `poll_interval` and also reacts to storage events
    /// from other tabs. It runs until the returned handle is aborted.
    pub fn setup_auto_logout(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let mut storage_events = supervisor.manager.store().subscribe();
        let period = supervisor.manager.config().poll_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        supervisor.tick();
                    }
                    received = storage_events.recv() => match received {
                        Ok(event) => {
                            supervisor.handle_storage_event(&event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("Missed {} storage events, recomputing session state", skipped);
                            supervisor.recompute();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            log::info!("Storage backend closed, stopping session supervisor");
                            break;
                        }
                    },
                }
            }
        })
    }

    fn publish(&self, state: AuthState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            let _ = self.events.send(SessionEvent::StateChanged(state));
        }
    }
}
