use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_payment_engine::db_types::ConfirmationStatus;

//--------------------------------------       Paystack        ---------------------------------------------------------

/// Every Paystack response is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackInitializeData {
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: String,
    pub reference: String,
}

/// The transaction object returned by `/transaction/verify` and carried in `charge.*` webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackTransaction {
    pub reference: String,
    /// In the currency's minor unit (kobo for NGN).
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    /// Whatever we sent at initialisation. Paystack returns an empty string when there was none.
    #[serde(default)]
    pub metadata: Value,
}

impl PaystackTransaction {
    pub fn confirmation_status(&self) -> ConfirmationStatus {
        match self.status.as_str() {
            "success" => ConfirmationStatus::Succeeded,
            "failed" | "reversed" => ConfirmationStatus::Failed,
            // abandoned, ongoing, pending, queued and processing can all still complete
            _ => ConfirmationStatus::Pending,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get("order_id").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackWebhook {
    pub event: String,
    pub data: PaystackTransaction,
}

//--------------------------------------        PalmPay        ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalmPayResponse<T> {
    pub resp_code: String,
    #[serde(default)]
    pub resp_msg: String,
    pub data: Option<T>,
}

impl<T> PalmPayResponse<T> {
    pub const SUCCESS: &'static str = "00000000";

    pub fn is_success(&self) -> bool {
        self.resp_code == Self::SUCCESS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalmPayCreateOrderData {
    pub order_no: String,
    pub checkout_url: String,
    #[serde(default)]
    pub order_status: Option<i64>,
}

/// PalmPay's numeric payment states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmPayOrderStatus {
    Pending,
    Success,
    Failed,
    Closed,
}

impl PalmPayOrderStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Pending),
            2 => Some(Self::Success),
            3 => Some(Self::Failed),
            4 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn confirmation_status(&self) -> ConfirmationStatus {
        match self {
            Self::Pending => ConfirmationStatus::Pending,
            Self::Success => ConfirmationStatus::Succeeded,
            Self::Failed | Self::Closed => ConfirmationStatus::Failed,
        }
    }
}

/// A PalmPay payment notification. Only the fields we act on are typed; the signature covers the whole body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalmPayCallback {
    /// Our order id, as sent in `createorder`.
    pub order_id: String,
    /// PalmPay's id for the payment.
    pub order_no: String,
    /// In the currency's minor unit.
    pub amount: i64,
    pub order_status: i64,
    #[serde(default)]
    pub currency: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub complete_time: Option<i64>,
}
