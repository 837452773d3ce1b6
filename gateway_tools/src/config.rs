use std::{env, time::Duration};

use log::*;
use spg_common::{helpers::env_var_non_empty, Secret};

const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_PALMPAY_BASE_URL: &str = "https://open-gw-prod.palmpay-inc.com";
const DEFAULT_CUSTOMER_EMAIL_DOMAIN: &str = "customers.storefront.invalid";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `None` when Paystack is not configured. Paystack payments and callbacks are then refused.
    pub paystack: Option<PaystackConfig>,
    pub palmpay: Option<PalmPayConfig>,
    /// The HTTP client timeout for every call to a provider.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub base_url: String,
    /// Used both as the API bearer token and as the webhook HMAC key.
    pub secret_key: Secret<String>,
    /// Where Paystack sends the customer after checkout.
    pub callback_url: String,
    /// Paystack insists on a customer email. Orders only carry a buyer id, so one is derived as `{id}@{domain}`.
    pub customer_email_domain: String,
}

#[derive(Debug, Clone, Default)]
pub struct PalmPayConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub app_id: String,
    /// The merchant's RSA private key (PEM, or the bare base64 body of a PKCS#8 key).
    pub merchant_private_key: Secret<String>,
    /// PalmPay's RSA public key, used to verify callbacks.
    pub palmpay_public_key: String,
    /// Where PalmPay sends the customer after checkout.
    pub callback_url: String,
    /// Where PalmPay posts payment notifications. Usually `{server}/payments/webhook/palmpay`.
    pub notify_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { paystack: None, palmpay: None, timeout: DEFAULT_GATEWAY_TIMEOUT }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let timeout = env::var("SPG_GATEWAY_TIMEOUT")
            .ok()
            .map(|s| {
                s.parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
                    warn!(
                        "🪛️ {s} is not a valid value for SPG_GATEWAY_TIMEOUT. {e}. Using the default, \
                         {DEFAULT_GATEWAY_TIMEOUT:?}, instead."
                    );
                    DEFAULT_GATEWAY_TIMEOUT
                })
            })
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT);
        let paystack = PaystackConfig::from_env();
        let palmpay = PalmPayConfig::from_env();
        if paystack.is_none() && palmpay.is_none() {
            warn!("🪛️ No payment providers are configured. Every payment attempt will be refused.");
        }
        Self { paystack, palmpay, timeout }
    }
}

impl PaystackConfig {
    /// Paystack is enabled by setting `SPG_PAYSTACK_SECRET_KEY`.
    pub fn from_env() -> Option<Self> {
        let Some(secret_key) = env_var_non_empty("SPG_PAYSTACK_SECRET_KEY") else {
            info!("🪛️ SPG_PAYSTACK_SECRET_KEY is not set. Paystack is disabled.");
            return None;
        };
        let base_url = env_var_non_empty("SPG_PAYSTACK_BASE_URL").unwrap_or_else(|| DEFAULT_PAYSTACK_BASE_URL.into());
        let callback_url = env_var_non_empty("SPG_PAYSTACK_CALLBACK_URL").unwrap_or_else(|| {
            warn!("🪛️ SPG_PAYSTACK_CALLBACK_URL is not set. Paystack will use the callback URL from its dashboard.");
            String::default()
        });
        let customer_email_domain = env_var_non_empty("SPG_PAYSTACK_CUSTOMER_EMAIL_DOMAIN")
            .unwrap_or_else(|| DEFAULT_CUSTOMER_EMAIL_DOMAIN.into());
        Some(Self { base_url, secret_key: Secret::new(secret_key), callback_url, customer_email_domain })
    }
}

impl PalmPayConfig {
    /// PalmPay is enabled when the merchant id, app id and both keys are all set.
    pub fn from_env() -> Option<Self> {
        let vars = [
            "SPG_PALMPAY_MERCHANT_ID",
            "SPG_PALMPAY_APP_ID",
            "SPG_PALMPAY_PRIVATE_KEY",
            "SPG_PALMPAY_PUBLIC_KEY",
        ]
        .map(env_var_non_empty);
        let [Some(merchant_id), Some(app_id), Some(private_key), Some(public_key)] = vars else {
            info!(
                "🪛️ SPG_PALMPAY_MERCHANT_ID, SPG_PALMPAY_APP_ID, SPG_PALMPAY_PRIVATE_KEY and SPG_PALMPAY_PUBLIC_KEY \
                 are not all set. PalmPay is disabled."
            );
            return None;
        };
        let base_url = env_var_non_empty("SPG_PALMPAY_BASE_URL").unwrap_or_else(|| DEFAULT_PALMPAY_BASE_URL.into());
        let callback_url = env_var_non_empty("SPG_PALMPAY_CALLBACK_URL").unwrap_or_default();
        let notify_url = env_var_non_empty("SPG_PALMPAY_NOTIFY_URL").unwrap_or_else(|| {
            warn!("🪛️ SPG_PALMPAY_NOTIFY_URL is not set. PalmPay will notify the URL from its dashboard.");
            String::default()
        });
        Some(Self {
            base_url,
            merchant_id,
            app_id,
            merchant_private_key: Secret::new(private_key),
            palmpay_public_key: public_key,
            callback_url,
            notify_url,
        })
    }
}
