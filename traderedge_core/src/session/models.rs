//! Session data models.

use crate::store::{UserData, keys};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Kind of principal behind the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserType {
    User,
    Admin,
    CustomerService,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::User => "user",
            UserType::Admin => "admin",
            UserType::CustomerService => "customer-service",
        }
    }

    /// Staff role for PIN-authenticated kinds, `None` for end users
    pub fn staff_role(self) -> Option<StaffRole> {
        match self {
            UserType::User => None,
            UserType::Admin => Some(StaffRole::Admin),
            UserType::CustomerService => Some(StaffRole::CustomerService),
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized user type tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown user type '{0}'")]
pub struct UnknownUserType(pub String);

impl FromStr for UserType {
    type Err = UnknownUserType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(UserType::User),
            "admin" => Ok(UserType::Admin),
            "customer-service" | "customer_service" | "cs" => Ok(UserType::CustomerService),
            other => Err(UnknownUserType(other.to_string())),
        }
    }
}

/// PIN-authenticated staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffRole {
    Admin,
    CustomerService,
}

impl StaffRole {
    pub const ALL: [StaffRole; 2] = [StaffRole::Admin, StaffRole::CustomerService];

    pub fn as_str(self) -> &'static str {
        self.user_type().as_str()
    }

    pub fn user_type(self) -> UserType {
        match self {
            StaffRole::Admin => UserType::Admin,
            StaffRole::CustomerService => UserType::CustomerService,
        }
    }

    /// Persisted key layout of this role's session
    pub fn keys(self) -> keys::StaffKeys {
        match self {
            StaffRole::Admin => keys::ADMIN,
            StaffRole::CustomerService => keys::CUSTOMER_SERVICE,
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = UnknownUserType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<UserType>()?
            .staff_role()
            .ok_or_else(|| UnknownUserType(s.to_string()))
    }
}

/// Identity carried by an authenticated session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Principal {
    User(UserData),
    Staff { role: StaffRole, username: String },
}

/// Externally visible authentication state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<Principal>,
    pub token: Option<String>,
    /// `None` when nobody is logged in
    pub user_type: Option<UserType>,
}

impl AuthState {
    pub fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            token: None,
            user_type: None,
        }
    }

    pub(crate) fn user(user: UserData, token: String) -> Self {
        Self {
            is_authenticated: true,
            user: Some(Principal::User(user)),
            token: Some(token),
            user_type: Some(UserType::User),
        }
    }

    pub(crate) fn staff(role: StaffRole, username: String, token: String) -> Self {
        Self {
            is_authenticated: true,
            user: Some(Principal::Staff { role, username }),
            token: Some(token),
            user_type: Some(role.user_type()),
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}
