//! Identity Service HTTP client.

use super::errors::{IdentityError, IdentityResult};
use crate::{config::IdentityConfig, store::Plan};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Registration request
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "plan_type", skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<Plan>,
}

impl RegisterRequest {
    /// Same rules the service applies, checked before sending
    ///
    /// # Errors
    ///
    /// * `IdentityError::Validation` - A field is blank or the password is too short
    pub fn validate(&self) -> IdentityResult<()> {
        let blank = [&self.first_name, &self.last_name, &self.email, &self.password]
            .iter()
            .any(|field| field.trim().is_empty());
        if blank {
            return Err(IdentityError::Validation("All fields are required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("plan_type", &self.plan_type)
            .finish_non_exhaustive()
    }
}

/// Login request
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> IdentityResult<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(IdentityError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Profile summary returned with a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub plan_type: Option<String>,
}

impl IdentityProfile {
    /// Subscription plan; unknown or missing values map to `basic`
    pub fn plan(&self) -> Plan {
        self.plan_type
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }
}

/// Successful register/login response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySession {
    #[serde(default)]
    pub message: Option<String>,
    pub access_token: String,
    pub user: IdentityProfile,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    msg: String,
}

/// Identity Service client
#[derive(Debug, Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    /// Create a client from identity configuration
    ///
    /// # Errors
    ///
    /// * `IdentityError::Transport` - The HTTP client could not be built
    pub fn new(config: &IdentityConfig) -> IdentityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Register a new account
    ///
    /// # Errors
    ///
    /// * `IdentityError::Validation` - Request failed local checks
    /// * `IdentityError::Rejected` - Service refused (e.g. email already registered)
    /// * `IdentityError::Server` / `Transport` / `Decode` - Service or network failure
    pub async fn register(&self, request: &RegisterRequest) -> IdentityResult<IdentitySession> {
        request.validate()?;
        let session = self.post("auth/register", request).await?;
        log::info!("Registered identity {}", session.user.id);
        Ok(session)
    }

    /// Log in with email and password
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub async fn login(&self, request: &LoginRequest) -> IdentityResult<IdentitySession> {
        request.validate()?;
        self.post("auth/login", request).await
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> IdentityResult<IdentitySession> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<IdentitySession>()
                .await
                .map_err(|e| IdentityError::Decode(e.to_string()));
        }

        if status.is_client_error() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.msg,
                Err(_) => format!("Request rejected (status {})", status.as_u16()),
            };
            log::warn!("Identity request to {} rejected: {}", path, message);
            return Err(IdentityError::Rejected(message));
        }

        log::error!("Identity service returned {} for {}", status, path);
        Err(IdentityError::Server(status.as_u16()))
    }
}
