//! Payment Verification Service client.

use super::{
    errors::{PaymentError, PaymentResult},
    models::{CryptoCurrency, VerificationResponse},
};
use crate::config::PaymentConfig;
use async_trait::async_trait;
use serde::Serialize;

/// Verifies provider-native payment references with the authoritative service
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Verify a card processor payment intent
    async fn verify_card(&self, payment_intent_id: &str) -> PaymentResult<VerificationResponse>;

    /// Verify an alternative processor order
    async fn verify_alt_processor(&self, order_id: &str) -> PaymentResult<VerificationResponse>;

    /// Verify an on-chain transfer of `expected_amount` to `wallet_address`
    async fn verify_crypto(
        &self,
        transaction_hash: &str,
        currency: CryptoCurrency,
        wallet_address: &str,
        expected_amount: f64,
    ) -> PaymentResult<VerificationResponse>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardVerificationRequest<'a> {
    payment_intent_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AltVerificationRequest<'a> {
    order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    merchant_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CryptoVerificationRequest<'a> {
    transaction_hash: &'a str,
    currency: CryptoCurrency,
    wallet_address: &'a str,
    expected_amount: f64,
}

/// HTTP implementation of [`VerificationService`]
///
/// Posts JSON to `{base}/verify-card-payment`, `{base}/verify-alt-payment` and
/// `{base}/verify-crypto-payment`. The only timeout applied is the transport
/// timeout from [`PaymentConfig::request_timeout`].
pub struct HttpVerificationService {
    client: reqwest::Client,
    base_url: String,
    card_account_id: Option<String>,
    alt_merchant_id: Option<String>,
}

impl HttpVerificationService {
    /// Create a client from payment configuration
    ///
    /// # Errors
    ///
    /// * `PaymentError::Http` - The HTTP client could not be built
    pub fn new(config: &PaymentConfig) -> PaymentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.verification_base_url.trim_end_matches('/').to_string(),
            card_account_id: config.card_account_id.clone(),
            alt_merchant_id: config.alt_merchant_id.clone(),
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> PaymentResult<VerificationResponse> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Verification endpoint {} returned {}", url, status);
            return Err(PaymentError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<VerificationResponse>()
            .await
            .map_err(|e| PaymentError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl VerificationService for HttpVerificationService {
    async fn verify_card(&self, payment_intent_id: &str) -> PaymentResult<VerificationResponse> {
        let body = CardVerificationRequest {
            payment_intent_id,
            account_id: self.card_account_id.as_deref(),
        };
        self.post("verify-card-payment", &body).await
    }

    async fn verify_alt_processor(&self, order_id: &str) -> PaymentResult<VerificationResponse> {
        let body = AltVerificationRequest {
            order_id,
            merchant_id: self.alt_merchant_id.as_deref(),
        };
        self.post("verify-alt-payment", &body).await
    }

    async fn verify_crypto(
        &self,
        transaction_hash: &str,
        currency: CryptoCurrency,
        wallet_address: &str,
        expected_amount: f64,
    ) -> PaymentResult<VerificationResponse> {
        let body = CryptoVerificationRequest {
            transaction_hash,
            currency,
            wallet_address,
            expected_amount,
        };
        self.post("verify-crypto-payment", &body).await
    }
}
