use actix_http::header::HeaderMap;
use log::debug;
use storefront_payment_engine::helpers::CallbackHeaders;

/// Copies the request headers into the form the webhook dispatcher expects. Headers with non-visible-ASCII values
/// cannot carry a signature and are skipped.
pub fn callback_headers(headers: &HeaderMap) -> CallbackHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| match value.to_str() {
            Ok(v) => Some((name.as_str().to_string(), v.to_string())),
            Err(_) => {
                debug!("💻️ Skipping callback header {name} with a non-ASCII value");
                None
            },
        })
        .collect()
}
