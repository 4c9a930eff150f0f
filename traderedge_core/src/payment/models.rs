//! Payment data models.

use crate::store::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Payment provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    AltProcessor,
    Crypto,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::AltProcessor => write!(f, "alt-processor"),
            PaymentMethod::Crypto => write!(f, "crypto"),
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

/// Supported chains for direct transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoCurrency {
    Eth,
    Sol,
    Btc,
}

impl CryptoCurrency {
    pub fn code(self) -> &'static str {
        match self {
            CryptoCurrency::Eth => "ETH",
            CryptoCurrency::Sol => "SOL",
            CryptoCurrency::Btc => "BTC",
        }
    }
}

impl std::fmt::Display for CryptoCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CryptoCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(CryptoCurrency::Eth),
            "SOL" => Ok(CryptoCurrency::Sol),
            "BTC" => Ok(CryptoCurrency::Btc),
            _ => Err(format!("Unsupported cryptocurrency: {s}")),
        }
    }
}

/// Provider-native correlation id stored alongside a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum ProviderReference {
    /// Card processor payment intent
    PaymentIntent(String),
    /// Alternative processor order
    Order(String),
    /// On-chain transaction hash
    TransactionHash(String),
}

/// One reconciled payment in `UserData.paymentHistory`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// Provider-native reference; unique within a history
    pub payment_id: String,
    pub method: PaymentMethod,
    /// Major currency units
    pub amount: f64,
    pub currency: String,
    pub plan: Plan,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ProviderReference>,
}

/// Externally reported payment completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum PaymentEvent {
    #[serde(rename_all = "camelCase")]
    Card { payment_intent_id: String, plan: Plan },
    #[serde(rename_all = "camelCase")]
    AltProcessor { order_id: String, plan: Plan },
    /// `amount` is client-declared and forwarded to the verifier as the
    /// expected transfer amount
    #[serde(rename_all = "camelCase")]
    Crypto {
        transaction_hash: String,
        currency: CryptoCurrency,
        amount: f64,
        plan: Plan,
    },
}

impl PaymentEvent {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentEvent::Card { .. } => PaymentMethod::Card,
            PaymentEvent::AltProcessor { .. } => PaymentMethod::AltProcessor,
            PaymentEvent::Crypto { .. } => PaymentMethod::Crypto,
        }
    }

    /// Provider-native reference, used as the `paymentId`
    pub fn payment_id(&self) -> &str {
        match self {
            PaymentEvent::Card {
                payment_intent_id, ..
            } => payment_intent_id,
            PaymentEvent::AltProcessor { order_id, .. } => order_id,
            PaymentEvent::Crypto {
                transaction_hash, ..
            } => transaction_hash,
        }
    }

    /// Plan the client asked for
    pub fn plan(&self) -> Plan {
        match self {
            PaymentEvent::Card { plan, .. }
            | PaymentEvent::AltProcessor { plan, .. }
            | PaymentEvent::Crypto { plan, .. } => *plan,
        }
    }
}

/// Receipt projection joining a stored payment with profile fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub receipt_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub payment: PaymentRecord,
    pub generated_at: DateTime<Utc>,
}

/// Provider settings that are safe to hand to a front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPaymentConfig {
    pub card_public_key: Option<String>,
    pub alt_client_id: Option<String>,
    pub crypto_wallets: BTreeMap<CryptoCurrency, String>,
}

/// Normalized answer from the Payment Verification Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub success: bool,
    #[serde(default)]
    pub payment: Option<VerifiedPayment>,
}

impl VerificationResponse {
    pub fn rejected() -> Self {
        Self {
            success: false,
            payment: None,
        }
    }
}

/// Verified payment details
///
/// Card verifications report `amount` in minor units (cents); the other
/// families report major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
}
