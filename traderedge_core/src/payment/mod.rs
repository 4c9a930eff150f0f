//! Payment reconciliation module.
//!
//! This module implements:
//! - Provider-specific verification (card, alternative processor, crypto transfer)
//! - Idempotent application keyed on the provider reference (`paymentId`)
//! - Atomic history + plan + subscription status updates
//! - Best-effort payment confirmation notices
//! - Plan price validation and receipt generation
//!
//! ## Example
//!
//! ```no_run
//! use traderedge_core::clock::SystemClock;
//! use traderedge_core::config::PaymentConfig;
//! use traderedge_core::payment::{PaymentEvent, PaymentReconciliationManager};
//! use traderedge_core::store::{MemoryStorage, Plan, UserDataStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clock = Arc::new(SystemClock);
//!     let store = Arc::new(UserDataStore::new(Arc::new(MemoryStorage::new()), clock.clone()));
//!     let payments =
//!         PaymentReconciliationManager::from_config(store, PaymentConfig::default(), clock)?;
//!
//!     let event = PaymentEvent::Card {
//!         payment_intent_id: "pi_123".to_string(),
//!         plan: Plan::Pro,
//!     };
//!     if payments.process_payment_completion(&event).await {
//!         println!("Upgraded to {}", Plan::Pro);
//!     }
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod notifier;
pub mod verifier;

pub use errors::{PaymentError, PaymentResult};
pub use manager::{PaymentReconciliationManager, ReconcileOutcome, validate_payment_amount};
pub use models::{
    CryptoCurrency, PaymentEvent, PaymentMethod, PaymentReceipt, PaymentRecord, PaymentStatus,
    ProviderReference, PublicPaymentConfig, VerificationResponse, VerifiedPayment,
};
pub use notifier::{HttpNotificationService, NotificationService};
pub use verifier::{HttpVerificationService, VerificationService};
