//! Payment reconciliation error types.

use super::models::PaymentMethod;
use crate::store::StoreError;
use thiserror::Error;

/// Payment reconciliation errors
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Event failed local validation
    #[error("Invalid payment event: {0}")]
    InvalidEvent(String),

    /// No local user record to apply the payment to
    #[error("No active user to apply payment to")]
    NoActiveUser,

    /// Verification service declined the payment
    #[error("{method} payment {payment_id} was not verified")]
    VerificationRejected {
        method: PaymentMethod,
        payment_id: String,
    },

    /// Verification service returned something unusable
    #[error("Malformed verification response: {0}")]
    MalformedResponse(String),

    /// Required provider setting is missing
    #[error("Payment provider not configured: {0}")]
    NotConfigured(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Service returned status {0}")]
    UnexpectedStatus(u16),

    /// Local store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PaymentError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Transport and storage details are replaced with generic messages.
    pub fn client_message(&self) -> String {
        match self {
            PaymentError::Http(_) | PaymentError::UnexpectedStatus(_) => {
                "Payment verification is temporarily unavailable".to_string()
            }
            PaymentError::Store(_) => "Internal error".to_string(),
            PaymentError::NotConfigured(_) => "Payment method unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
