//! Notification Service client.

use super::{
    errors::{PaymentError, PaymentResult},
    models::PaymentEvent,
};
use crate::config::PaymentConfig;
use async_trait::async_trait;

/// Sends a receipt for a completed payment
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_payment_confirmation(&self, event: &PaymentEvent) -> PaymentResult<()>;
}

/// Fire-and-forget HTTP notifier; any 2xx counts as accepted
pub struct HttpNotificationService {
    client: reqwest::Client,
    url: String,
}

impl HttpNotificationService {
    pub fn new(config: &PaymentConfig) -> PaymentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.notification_url.clone(),
        })
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn send_payment_confirmation(&self, event: &PaymentEvent) -> PaymentResult<()> {
        let response = self.client.post(&self.url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(PaymentError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(())
    }
}
