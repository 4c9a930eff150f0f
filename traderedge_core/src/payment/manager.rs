//! Payment reconciliation manager implementation.

use super::{
    errors::{PaymentError, PaymentResult},
    models::{
        CryptoCurrency, PaymentEvent, PaymentMethod, PaymentReceipt, PaymentRecord,
        PaymentStatus, ProviderReference, PublicPaymentConfig, VerificationResponse,
        VerifiedPayment,
    },
    notifier::{HttpNotificationService, NotificationService},
    verifier::{HttpVerificationService, VerificationService},
};
use crate::{
    clock::Clock,
    config::PaymentConfig,
    store::{AppendOutcome, Plan, UserDataStore},
};
use std::sync::Arc;

/// Result of a successful reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Payment was new and has been applied
    Applied(PaymentRecord),
    /// Payment was already in the history; nothing new was applied
    AlreadyRecorded,
}

/// Check a reported amount against the plan price table
///
/// # Arguments
///
/// * `plan` - Plan name (`kickstarter`, `basic`, `pro`, `enterprise`)
/// * `amount` - Amount in USD
///
/// # Returns
///
/// * `bool` - `true` only for a known plan at exactly its list price
pub fn validate_payment_amount(plan: &str, amount: f64) -> bool {
    match plan.parse::<Plan>() {
        Ok(plan) => amount.is_finite() && (plan.price() - amount).abs() < f64::EPSILON,
        Err(_) => false,
    }
}

/// Payment reconciliation manager
///
/// Turns an externally reported payment completion into a single idempotent
/// update of the local user record.
pub struct PaymentReconciliationManager {
    store: Arc<UserDataStore>,
    verifier: Arc<dyn VerificationService>,
    notifier: Arc<dyn NotificationService>,
    config: PaymentConfig,
    clock: Arc<dyn Clock>,
}

impl PaymentReconciliationManager {
    /// Create a new reconciliation manager
    ///
    /// # Arguments
    ///
    /// * `store` - Local user data store
    /// * `verifier` - Payment Verification Service client
    /// * `notifier` - Notification Service client
    /// * `config` - Provider configuration (wallets, public keys)
    /// * `clock` - Time source for record and receipt timestamps
    pub fn new(
        store: Arc<UserDataStore>,
        verifier: Arc<dyn VerificationService>,
        notifier: Arc<dyn NotificationService>,
        config: PaymentConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            verifier,
            notifier,
            config,
            clock,
        }
    }

    /// Create a manager talking HTTP to the configured services
    ///
    /// # Errors
    ///
    /// * `PaymentError::Http` - An HTTP client could not be built
    pub fn from_config(
        store: Arc<UserDataStore>,
        config: PaymentConfig,
        clock: Arc<dyn Clock>,
    ) -> PaymentResult<Self> {
        let verifier = Arc::new(HttpVerificationService::new(&config)?);
        let notifier = Arc::new(HttpNotificationService::new(&config)?);
        Ok(Self::new(store, verifier, notifier, config, clock))
    }

    /// Verify a payment completion and apply it to the local record
    ///
    /// History, plan and subscription status are written in one store commit.
    /// A `paymentId` already present in the history is not appended again and
    /// the call still succeeds. The confirmation notice is sent only for newly
    /// applied payments; its failure is logged and ignored.
    ///
    /// # Errors
    ///
    /// * `PaymentError::InvalidEvent` - Empty reference or bad crypto amount
    /// * `PaymentError::NoActiveUser` - No local record to apply to
    /// * `PaymentError::VerificationRejected` - Service did not confirm it
    /// * `PaymentError::Http` / `UnexpectedStatus` / `MalformedResponse` -
    ///   Verification call failed
    /// * `PaymentError::Store` - Local write failed
    pub async fn reconcile(&self, event: &PaymentEvent) -> PaymentResult<ReconcileOutcome> {
        validate_event(event)?;

        if self.store.get().is_none() {
            return Err(PaymentError::NoActiveUser);
        }

        let record = match event {
            PaymentEvent::Card {
                payment_intent_id,
                plan,
            } => self.verify_card(payment_intent_id, *plan).await?,
            PaymentEvent::AltProcessor { order_id, plan } => {
                self.verify_alt_processor(order_id, *plan).await?
            }
            PaymentEvent::Crypto {
                transaction_hash,
                currency,
                amount,
                plan,
            } => {
                self.verify_crypto(transaction_hash, *currency, *amount, *plan)
                    .await?
            }
        };

        let outcome = self
            .store
            .record_verified_payment(record.clone(), record.plan)?
            .ok_or(PaymentError::NoActiveUser)?;

        match outcome {
            AppendOutcome::Appended => {
                log::info!(
                    "Applied {} payment {} for plan {}",
                    record.method,
                    record.payment_id,
                    record.plan
                );
                self.send_confirmation(event).await;
                Ok(ReconcileOutcome::Applied(record))
            }
            AppendOutcome::AlreadyRecorded => {
                log::info!(
                    "Payment {} already reconciled, skipping duplicate",
                    record.payment_id
                );
                Ok(ReconcileOutcome::AlreadyRecorded)
            }
        }
    }

    /// Verify and apply a payment completion
    ///
    /// # Returns
    ///
    /// * `bool` - `true` when the payment is verified and recorded (including
    ///   a repeated delivery of an already recorded payment)
    pub async fn process_payment_completion(&self, event: &PaymentEvent) -> bool {
        match self.reconcile(event).await {
            Ok(_) => true,
            Err(e @ PaymentError::VerificationRejected { .. })
            | Err(e @ PaymentError::InvalidEvent(_))
            | Err(e @ PaymentError::NoActiveUser) => {
                log::warn!("Payment {} not applied: {}", event.payment_id(), e);
                false
            }
            Err(e) => {
                log::error!("Payment processing failed for {}: {}", event.payment_id(), e);
                false
            }
        }
    }

    /// See [`validate_payment_amount`]
    pub fn validate_payment_amount(&self, plan: &str, amount: f64) -> bool {
        validate_payment_amount(plan, amount)
    }

    /// Receipt for a recorded payment
    ///
    /// # Returns
    ///
    /// * `Option<PaymentReceipt>` - `None` if there is no record or no payment
    ///   with that id
    pub fn generate_payment_receipt(&self, payment_id: &str) -> Option<PaymentReceipt> {
        let user = self.store.get()?;
        let payment = user.payment(payment_id)?.clone();
        Some(PaymentReceipt {
            receipt_id: format!("RECEIPT_{payment_id}"),
            customer_name: user.username,
            customer_email: user.email,
            payment,
            generated_at: self.clock.now(),
        })
    }

    /// All recorded payments, oldest first
    pub fn payment_history(&self) -> Vec<PaymentRecord> {
        self.store
            .get()
            .map(|user| user.payment_history)
            .unwrap_or_default()
    }

    /// Provider settings that may be shown to a front end
    pub fn public_config(&self) -> PublicPaymentConfig {
        PublicPaymentConfig {
            card_public_key: self.config.card_public_key.clone(),
            alt_client_id: self.config.alt_client_id.clone(),
            crypto_wallets: self.config.wallets.clone(),
        }
    }

    async fn verify_card(&self, payment_intent_id: &str, requested: Plan) -> PaymentResult<PaymentRecord> {
        let response = self.verifier.verify_card(payment_intent_id).await?;
        let payment = accepted(response, PaymentMethod::Card, payment_intent_id)?;

        // Card amounts arrive in minor units
        let amount = payment.amount / 100.0;
        let currency = required_currency(&payment)?;
        self.build_record(
            payment_intent_id,
            PaymentMethod::Card,
            amount,
            currency,
            resolve_plan(&payment, requested),
            ProviderReference::PaymentIntent(payment_intent_id.to_string()),
        )
    }

    async fn verify_alt_processor(&self, order_id: &str, requested: Plan) -> PaymentResult<PaymentRecord> {
        let response = self.verifier.verify_alt_processor(order_id).await?;
        let payment = accepted(response, PaymentMethod::AltProcessor, order_id)?;

        let currency = required_currency(&payment)?;
        self.build_record(
            order_id,
            PaymentMethod::AltProcessor,
            payment.amount,
            currency,
            resolve_plan(&payment, requested),
            ProviderReference::Order(order_id.to_string()),
        )
    }

    async fn verify_crypto(
        &self,
        transaction_hash: &str,
        currency: CryptoCurrency,
        expected_amount: f64,
        requested: Plan,
    ) -> PaymentResult<PaymentRecord> {
        let wallet = self
            .config
            .wallets
            .get(&currency)
            .ok_or_else(|| PaymentError::NotConfigured(format!("{currency} receiving wallet")))?;

        let response = self
            .verifier
            .verify_crypto(transaction_hash, currency, wallet, expected_amount)
            .await?;
        let payment = accepted(response, PaymentMethod::Crypto, transaction_hash)?;

        self.build_record(
            transaction_hash,
            PaymentMethod::Crypto,
            payment.amount,
            currency.code().to_string(),
            resolve_plan(&payment, requested),
            ProviderReference::TransactionHash(transaction_hash.to_string()),
        )
    }

    fn build_record(
        &self,
        payment_id: &str,
        method: PaymentMethod,
        amount: f64,
        currency: String,
        plan: Plan,
        reference: ProviderReference,
    ) -> PaymentResult<PaymentRecord> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PaymentError::MalformedResponse(format!(
                "non-positive verified amount {amount}"
            )));
        }
        Ok(PaymentRecord {
            payment_id: payment_id.to_string(),
            method,
            amount,
            currency,
            plan,
            status: PaymentStatus::Completed,
            timestamp: self.clock.now(),
            reference: Some(reference),
        })
    }

    async fn send_confirmation(&self, event: &PaymentEvent) {
        if let Err(e) = self.notifier.send_payment_confirmation(event).await {
            log::warn!(
                "Failed to send payment confirmation for {}: {}",
                event.payment_id(),
                e
            );
        }
    }
}

fn validate_event(event: &PaymentEvent) -> PaymentResult<()> {
    let reference = event.payment_id();
    if reference.trim().is_empty() {
        return Err(PaymentError::InvalidEvent(format!(
            "missing {} payment reference",
            event.method()
        )));
    }
    if reference.chars().any(char::is_whitespace) {
        return Err(PaymentError::InvalidEvent(format!(
            "payment reference '{reference}' contains whitespace"
        )));
    }
    if let PaymentEvent::Crypto { amount, .. } = event {
        if !amount.is_finite() || *amount <= 0.0 {
            return Err(PaymentError::InvalidEvent(format!(
                "crypto amount must be positive, got {amount}"
            )));
        }
    }
    Ok(())
}

fn accepted(
    response: VerificationResponse,
    method: PaymentMethod,
    payment_id: &str,
) -> PaymentResult<VerifiedPayment> {
    match response {
        VerificationResponse {
            success: true,
            payment: Some(payment),
        } => Ok(payment),
        _ => Err(PaymentError::VerificationRejected {
            method,
            payment_id: payment_id.to_string(),
        }),
    }
}

fn required_currency(payment: &VerifiedPayment) -> PaymentResult<String> {
    payment
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
        .ok_or_else(|| PaymentError::MalformedResponse("missing currency".to_string()))
}

/// The service's plan wins over the client's request when it names a known plan.
fn resolve_plan(payment: &VerifiedPayment, requested: Plan) -> Plan {
    match payment.plan.as_deref().map(str::parse::<Plan>) {
        Some(Ok(verified)) => {
            if verified != requested {
                log::warn!(
                    "Verified plan {} differs from requested plan {}, using verified",
                    verified,
                    requested
                );
            }
            verified
        }
        _ => requested,
    }
}
