//! Identity Service client.
//!
//! Registration and login against the account backend. A successful call
//! yields an [`IdentitySession`] that the session manager turns into a local
//! user session.

pub mod client;
pub mod errors;

pub use client::{
    IdentityClient, IdentityProfile, IdentitySession, LoginRequest, MIN_PASSWORD_LENGTH,
    RegisterRequest,
};
pub use errors::{IdentityError, IdentityResult};
