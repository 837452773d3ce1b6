use std::env;

use chrono::Duration;
use gateway_tools::GatewayConfig;
use log::*;
use spg_common::{helpers::env_var_non_empty, DEFAULT_CURRENCY_CODE};
use storefront_payment_engine::sqlite::db::SQLITE_DB_URL;

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8460;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The time before an unpaid order is cancelled and its stock returned.
    pub unpaid_order_timeout: Duration,
    /// How often the expiry worker looks for unpaid orders.
    pub expiry_interval: std::time::Duration,
    /// The currency for orders that do not name one.
    pub default_currency: String,
    /// Payment provider configuration. Providers without credentials are disabled.
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: SQLITE_DB_URL.to_string(),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            default_currency: DEFAULT_CURRENCY_CODE.to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env_var_non_empty("SPG_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ SPG_DATABASE_URL is not set. Using the default database at {SQLITE_DB_URL}.");
            SQLITE_DB_URL.to_string()
        });
        let unpaid_order_timeout = configure_unpaid_order_timeout(env::var("SPG_UNPAID_ORDER_TIMEOUT").ok());
        let expiry_interval = configure_expiry_interval(env::var("SPG_EXPIRY_INTERVAL").ok());
        let default_currency = configure_default_currency(env_var_non_empty("SPG_DEFAULT_CURRENCY"));
        let gateway = GatewayConfig::from_env_or_default();
        Self { host, port, database_url, unpaid_order_timeout, expiry_interval, default_currency, gateway }
    }
}

fn configure_unpaid_order_timeout(value: Option<String>) -> Duration {
    let Some(s) = value else {
        info!(
            "🪛️ SPG_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
            DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours()
        );
        return DEFAULT_UNPAID_ORDER_TIMEOUT;
    };
    match s.trim().parse::<i64>() {
        Ok(hrs) if hrs > 0 => Duration::hours(hrs),
        Ok(hrs) => {
            warn!("🪛️ SPG_UNPAID_ORDER_TIMEOUT must be a positive number of hours, not {hrs}. Using the default.");
            DEFAULT_UNPAID_ORDER_TIMEOUT
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for SPG_UNPAID_ORDER_TIMEOUT. {e}. Using the default.");
            DEFAULT_UNPAID_ORDER_TIMEOUT
        },
    }
}

fn configure_expiry_interval(value: Option<String>) -> std::time::Duration {
    value
        .and_then(|s| match s.trim().parse::<u64>() {
            Ok(0) => {
                warn!("🪛️ SPG_EXPIRY_INTERVAL cannot be zero. Using the default.");
                None
            },
            Ok(secs) => Some(std::time::Duration::from_secs(secs)),
            Err(e) => {
                warn!("🪛️ Invalid configuration value for SPG_EXPIRY_INTERVAL. {e}. Using the default.");
                None
            },
        })
        .unwrap_or(DEFAULT_EXPIRY_INTERVAL)
}

fn configure_default_currency(value: Option<String>) -> String {
    match value {
        Some(s) if s.trim().len() == 3 && s.trim().chars().all(|c| c.is_ascii_alphabetic()) => {
            s.trim().to_ascii_uppercase()
        },
        Some(s) => {
            warn!("🪛️ {s} is not a valid ISO currency code for SPG_DEFAULT_CURRENCY. Using {DEFAULT_CURRENCY_CODE}.");
            DEFAULT_CURRENCY_CODE.to_string()
        },
        None => DEFAULT_CURRENCY_CODE.to_string(),
    }
}
