use crate::{
    db_types::PaymentProvider,
    traits::{NewWebhookEvent, StorageError, WebhookEvent},
};

/// An append-only log of inbound callback deliveries. Nothing in the payment flow reads it back.
#[allow(async_fn_in_trait)]
pub trait WebhookAudit {
    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<i64, StorageError>;

    /// The most recent `limit` events, newest first, optionally restricted to one provider.
    async fn fetch_webhook_events(
        &self,
        provider: Option<PaymentProvider>,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, StorageError>;
}
