//! Persistent store for the locally mirrored user record.
//!
//! This module implements:
//! - A pluggable key/value backend (in-memory or a durable JSON file)
//! - Typed accessors for the `UserData` record and the user auth token
//! - Mirror fields (plan, user id, email) written in the same commit as the record
//! - Change notifications so other store instances ("tabs") can react
//!
//! Corrupt or unreadable entries are reported as absent, never as errors.
//!
//! ## Example
//!
//! ```
//! use traderedge_core::clock::SystemClock;
//! use traderedge_core::store::{MemoryStorage, NewUserData, UserDataStore};
//! use std::sync::Arc;
//!
//! let store = UserDataStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
//! store
//!     .create_user_data(NewUserData {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! store.set_auth_token("token").unwrap();
//! assert!(store.is_authenticated());
//! ```

pub mod backend;
pub mod errors;
pub mod keys;
pub mod manager;
pub mod models;

pub use backend::{FileStorage, MemoryStorage, StorageBackend, StorageEvent, StorageOp, TabId};
pub use errors::{StoreError, StoreResult};
pub use keys::Namespace;
pub use manager::UserDataStore;
pub use models::{
    AppendOutcome, DashboardData, NewUserData, Plan, SubscriptionStatus, UnknownPlan, UserData,
    UserDataPatch,
};
