use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use storefront_payment_engine::{
    db_types::ProductId,
    order_objects::ApprovalOutcome,
    traits::{GatewayError, StorageError},
    OrderFlowError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid request. {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(ProductId),
    /// The request is valid, but the order is not in a state that allows it.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("The payment provider did not respond in time. Please try again. {0}")]
    GatewayTimeout(String),
    #[error("The payment provider could not complete the request. {0}")]
    GatewayFailure(String),
}

impl ServerError {
    /// A stable, machine-readable label for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InitializeError(_) | Self::ConfigurationError(_) => "configuration_error",
            Self::BackendError(_) | Self::IOError(_) | Self::Unspecified(_) => "internal_error",
            Self::InvalidRequestBody(_) => "validation_error",
            Self::NoRecordFound(_) => "not_found",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::Conflict { code, .. } => code,
            Self::GatewayTimeout(_) => "gateway_timeout",
            Self::GatewayFailure(_) => "gateway_error",
        }
    }

    pub fn approval_rejected(outcome: &ApprovalOutcome) -> Self {
        let code = match outcome {
            ApprovalOutcome::Approved(_) => "approved",
            ApprovalOutcome::AlreadyApproved(_) => "already_approved",
            ApprovalOutcome::NotPaid(_) => "not_paid",
            ApprovalOutcome::Cancelled(_) => "cancelled",
        };
        Self::Conflict { code, message: outcome.to_string() }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::GatewayFailure(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "code": self.code() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::ValidationError(msg) => Self::InvalidRequestBody(msg),
            OrderFlowError::InsufficientStock(product_id) => Self::InsufficientStock(product_id),
            OrderFlowError::OrderNotFound(_) | OrderFlowError::PaymentNotMatched { .. } => {
                Self::NoRecordFound(e.to_string())
            },
            OrderFlowError::InvalidTransition { .. } => {
                Self::Conflict { code: "invalid_transition", message: e.to_string() }
            },
            OrderFlowError::AmountMismatch { .. } => Self::Conflict { code: "amount_mismatch", message: e.to_string() },
            OrderFlowError::CurrencyMismatch { .. } => {
                Self::Conflict { code: "currency_mismatch", message: e.to_string() }
            },
            OrderFlowError::ReferenceMismatch { .. } => {
                Self::Conflict { code: "reference_mismatch", message: e.to_string() }
            },
            OrderFlowError::Gateway(e) => e.into(),
            OrderFlowError::Storage(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout(_) => Self::GatewayTimeout(e.to_string()),
            GatewayError::ProviderNotConfigured(_) | GatewayError::Unsupported(..) => {
                Self::InvalidRequestBody(e.to_string())
            },
            GatewayError::Rejected(_) | GatewayError::Communication(_) | GatewayError::InvalidCallback(_) => {
                Self::GatewayFailure(e.to_string())
            },
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        error!("💻️ Storage error while handling a request: {e}");
        Self::BackendError(format!("Database error: {e}"))
    }
}
