//! Identity Service error types.

use thiserror::Error;

/// Identity Service errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Request failed client-side checks and was not sent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Service refused the request (bad credentials, duplicate email, ...)
    #[error("{0}")]
    Rejected(String),

    /// Service fault
    #[error("Identity service error (status {0})")]
    Server(u16),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Malformed identity response: {0}")]
    Decode(String),
}

impl IdentityError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            IdentityError::Validation(_) | IdentityError::Rejected(_) => self.to_string(),
            IdentityError::Server(_) | IdentityError::Decode(_) => {
                "Identity service error, please try again later".to_string()
            }
            IdentityError::Transport(_) => "Could not reach the identity service".to_string(),
        }
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
