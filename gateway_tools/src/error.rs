use std::time::Duration;

use storefront_payment_engine::traits::GatewayError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid provider configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider declined the request. Code {code}. {message}")]
    ProviderError { code: String, message: String },
    #[error("The provider did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Could not sign the request: {0}")]
    Signing(String),
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),
}

impl GatewayApiError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout)
        } else if e.is_builder() {
            Self::RestRequestError(e.to_string())
        } else {
            Self::RestResponseError(e.to_string())
        }
    }
}

impl From<GatewayApiError> for GatewayError {
    fn from(e: GatewayApiError) -> Self {
        match e {
            GatewayApiError::Timeout(d) => GatewayError::Timeout(d),
            GatewayApiError::QueryError { status, message } if (400..500).contains(&status) => {
                GatewayError::Rejected(format!("Error {status}. {message}"))
            },
            e @ GatewayApiError::ProviderError { .. } => GatewayError::Rejected(e.to_string()),
            GatewayApiError::InvalidCallback(s) => GatewayError::InvalidCallback(s),
            e => GatewayError::Communication(e.to_string()),
        }
    }
}
