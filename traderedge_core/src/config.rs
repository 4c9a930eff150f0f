//! Core configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use crate::payment::CryptoCurrency;
use crate::session::StaffRole;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PAYMENT_API_URL: &str = "https://traderedgepro.com/api";
const DEFAULT_IDENTITY_API_URL: &str = "http://localhost:5000/api";

/// Complete configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// Local state file
    pub storage: StorageConfig,
    /// Session lifetime, polling and staff PINs
    pub session: SessionConfig,
    /// Payment provider settings
    pub payment: PaymentConfig,
    /// Identity Service endpoint
    pub identity: IdentityConfig,
}

/// Local persistence configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path of the durable state file
    pub path: PathBuf,
    /// How often a long-running process re-reads the file for changes made
    /// by other processes
    pub watch_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("traderedge_state.json"),
            watch_interval: Duration::from_millis(500),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session stays valid after login or the last refresh
    pub lifetime: chrono::Duration,
    /// Period of the expiry/refresh poll
    pub poll_interval: Duration,
    /// Staff PINs
    pub role_pins: RolePins,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: chrono::Duration::hours(24),
            poll_interval: Duration::from_secs(60),
            role_pins: RolePins::default(),
        }
    }
}

/// Per-role staff PINs. A role without a PIN cannot log in.
#[derive(Clone, Default)]
pub struct RolePins {
    pub admin: Option<String>,
    pub customer_service: Option<String>,
}

impl RolePins {
    pub fn pin_for(&self, role: StaffRole) -> Option<&str> {
        match role {
            StaffRole::Admin => self.admin.as_deref(),
            StaffRole::CustomerService => self.customer_service.as_deref(),
        }
    }
}

impl std::fmt::Debug for RolePins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |pin: &Option<String>| pin.as_ref().map(|_| "<redacted>");
        f.debug_struct("RolePins")
            .field("admin", &redact(&self.admin))
            .field("customer_service", &redact(&self.customer_service))
            .finish()
    }
}

/// Payment provider configuration
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Base URL of the Payment Verification Service
    pub verification_base_url: String,
    /// Notification Service endpoint for payment confirmations
    pub notification_url: String,
    /// Card processor account the intents belong to
    pub card_account_id: Option<String>,
    /// Publishable card processor key
    pub card_public_key: Option<String>,
    /// Alternative processor merchant id
    pub alt_merchant_id: Option<String>,
    /// Alternative processor public client id
    pub alt_client_id: Option<String>,
    /// Receiving wallet per chain
    pub wallets: BTreeMap<CryptoCurrency, String>,
    /// Transport timeout for verification and notification calls
    pub request_timeout: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            verification_base_url: DEFAULT_PAYMENT_API_URL.to_string(),
            notification_url: format!("{DEFAULT_PAYMENT_API_URL}/send-payment-confirmation"),
            card_account_id: None,
            card_public_key: None,
            alt_merchant_id: None,
            alt_client_id: None,
            wallets: BTreeMap::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Identity Service configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base URL; `/auth/register` and `/auth/login` are appended
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IDENTITY_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables
    ///
    /// # Returns
    ///
    /// * `Result<CoreConfig, ConfigError>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = StorageConfig {
            path: std::env::var("TRADEREDGE_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| StorageConfig::default().path),
            watch_interval: Duration::from_millis(parse_env_or(
                "TRADEREDGE_STATE_WATCH_MS",
                500,
            )?),
        };

        let lifetime_hours = parse_env_or("SESSION_LIFETIME_HOURS", 24)?;
        let session = SessionConfig {
            lifetime: chrono::Duration::try_hours(lifetime_hours).ok_or_else(|| {
                ConfigError::Invalid {
                    var: "SESSION_LIFETIME_HOURS".to_string(),
                    reason: format!("{lifetime_hours} hours is out of range"),
                }
            })?,
            poll_interval: Duration::from_secs(parse_env_or("SESSION_POLL_INTERVAL_SECS", 60)?),
            role_pins: RolePins {
                admin: non_empty_env("ADMIN_PIN"),
                customer_service: non_empty_env("CUSTOMER_SERVICE_PIN"),
            },
        };

        let mut wallets = BTreeMap::new();
        for (currency, var) in [
            (CryptoCurrency::Eth, "ETH_WALLET"),
            (CryptoCurrency::Sol, "SOL_WALLET"),
            (CryptoCurrency::Btc, "BTC_WALLET"),
        ] {
            if let Some(wallet) = non_empty_env(var) {
                wallets.insert(currency, wallet);
            }
        }

        let verification_base_url =
            non_empty_env("PAYMENT_API_URL").unwrap_or_else(|| DEFAULT_PAYMENT_API_URL.to_string());
        let notification_url = non_empty_env("PAYMENT_NOTIFICATION_URL")
            .unwrap_or_else(|| format!("{verification_base_url}/send-payment-confirmation"));

        let payment = PaymentConfig {
            verification_base_url,
            notification_url,
            card_account_id: non_empty_env("CARD_ACCOUNT_ID"),
            card_public_key: non_empty_env("CARD_PUBLIC_KEY"),
            alt_merchant_id: non_empty_env("ALT_MERCHANT_ID"),
            alt_client_id: non_empty_env("ALT_CLIENT_ID"),
            wallets,
            request_timeout: Duration::from_secs(parse_env_or("PAYMENT_HTTP_TIMEOUT_SECS", 10)?),
        };

        let identity = IdentityConfig {
            base_url: non_empty_env("IDENTITY_API_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_API_URL.to_string()),
            request_timeout: Duration::from_secs(parse_env_or("IDENTITY_HTTP_TIMEOUT_SECS", 10)?),
        };

        let config = CoreConfig {
            storage,
            session,
            payment,
            identity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.lifetime <= chrono::Duration::zero() {
            return Err(ConfigError::Invalid {
                var: "SESSION_LIFETIME_HOURS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.storage.watch_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TRADEREDGE_STATE_WATCH_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.session.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SESSION_POLL_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        for (var, pin) in [
            ("ADMIN_PIN", &self.session.role_pins.admin),
            ("CUSTOMER_SERVICE_PIN", &self.session.role_pins.customer_service),
        ] {
            if let Some(pin) = pin {
                validate_pin(var, pin)?;
            }
        }

        if let (Some(admin), Some(cs)) = (
            &self.session.role_pins.admin,
            &self.session.role_pins.customer_service,
        ) {
            if admin == cs {
                return Err(ConfigError::Invalid {
                    var: "CUSTOMER_SERVICE_PIN".to_string(),
                    reason: "Must differ from ADMIN_PIN".to_string(),
                });
            }
        }

        for (var, url) in [
            ("PAYMENT_API_URL", &self.payment.verification_base_url),
            ("PAYMENT_NOTIFICATION_URL", &self.payment.notification_url),
            ("IDENTITY_API_URL", &self.identity.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("Must be an http(s) URL, got '{url}'"),
                });
            }
        }

        Ok(())
    }
}

fn validate_pin(var: &str, pin: &str) -> Result<(), ConfigError> {
    if !(4..=12).contains(&pin.len()) || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: "Must be 4-12 digits".to_string(),
        });
    }
    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse an environment variable, falling back to `default` when it
/// is unset or blank
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{value}' is not valid: {e}"),
        }),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
