//! # TraderEdge Core
//!
//! Client-side session and payment reconciliation core for the TraderEdge
//! trading dashboard.
//!
//! The library keeps a local mirror of the authoritative user and
//! subscription data, tracks who is logged in across several "tabs" that share
//! one storage area, and applies externally reported payments to the mirror
//! exactly once.
//!
//! ## Architecture
//!
//! Components are composed bottom-up and wired by explicit construction:
//!
//! - **Persistent Store** ([`store`]): keyed storage backend shared by every
//!   tab, plus the typed [`UserDataStore`] over it
//! - **Session Manager** ([`session`]): login, logout and expiry for end
//!   users, administrators and customer-service agents
//! - **Payment Reconciliation Manager** ([`payment`]): verifies a completed
//!   payment and records it idempotently
//!
//! The [`identity`] client talks to the account backend; [`config`] loads all
//! settings from the environment.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use traderedge_core::{
//!     clock::SystemClock,
//!     config::SessionConfig,
//!     session::SessionManager,
//!     store::{MemoryStorage, NewUserData, UserDataStore},
//! };
//!
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(UserDataStore::new(Arc::new(MemoryStorage::new()), clock.clone()));
//! let sessions = SessionManager::new(store.clone(), clock, SessionConfig::default());
//!
//! let user = store
//!     .create_user_data(NewUserData {
//!         username: "trader".to_string(),
//!         email: "trader@example.com".to_string(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! sessions.login_user(&user, "bearer-token").unwrap();
//! assert!(sessions.check_auth_state().is_authenticated);
//! ```

/// Injectable time source.
pub mod clock;

/// Environment-driven configuration.
pub mod config;

/// Identity Service client.
pub mod identity;

/// Payment verification and reconciliation.
pub mod payment;

/// Authentication state for all principal kinds.
pub mod session;

/// Local persistent store.
pub mod store;

pub use config::CoreConfig;
pub use payment::PaymentReconciliationManager;
pub use session::{AuthState, SessionManager, SessionSupervisor};
pub use store::UserDataStore;
