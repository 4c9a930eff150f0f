//! Session management module.
//!
//! Tracks who is logged in across three principal kinds that share one
//! storage backend:
//! - End users, authenticated by a bearer token from the Identity Service
//! - Administrators and customer-service agents, authenticated by a per-role PIN
//!
//! Staff sessions take precedence over a user session present at the same time.
//! Every session expires after a fixed lifetime unless refreshed.

pub mod manager;
pub mod models;
pub mod supervisor;

pub use manager::SessionManager;
pub use models::{AuthState, Principal, StaffRole, UnknownUserType, UserType};
pub use supervisor::{SessionEvent, SessionSupervisor};
