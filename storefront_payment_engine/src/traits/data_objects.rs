use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::PaymentProvider;

/// What a gateway hands back after a payment has been started: where to send the customer, and the id under which
/// the provider will report on the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub provider: PaymentProvider,
    pub redirect_url: String,
    pub provider_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebhookEvent {
    /// The provider name as it appeared in the request path. It may not be a provider we know.
    pub provider: String,
    pub provider_reference: Option<String>,
    pub signature_valid: bool,
    pub outcome: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub signature_valid: bool,
    pub outcome: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}
