//! # Canonical strings
//!
//! Providers that sign structured payloads (rather than raw bytes) agree with us on a deterministic text rendering
//! of the payload. The rendering is:
//!
//! * every top-level field except the ones named in `exclude` (i.e. the signature field itself),
//! * fields whose value is `null` or an empty string are skipped,
//! * keys are sorted lexicographically (byte order),
//! * each field is written as `key=value` and the fields are joined with `&`,
//! * strings are written without quotes, numbers and booleans in their JSON form, and nested objects or arrays as
//!   their compact JSON serialization, with nested keys in the order they were received.
//!
//! ```text
//!    {"orderId":"A1","amount":500,"sign":"..","extra":{"b":1}}  =>  amount=500&extra={"b":1}&orderId=A1
//! ```
use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Renders `payload` as a canonical string, leaving out the fields named in `exclude`.
pub fn canonical_string(payload: &Map<String, Value>, exclude: &[&str]) -> String {
    let sorted = payload
        .iter()
        .filter(|(k, _)| !exclude.contains(&k.as_str()))
        .filter_map(|(k, v)| canonical_value(v).map(|v| (k.as_str(), v)))
        .collect::<BTreeMap<&str, String>>();
    sorted.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<String>>().join("&")
}

/// Renders a set of string pairs (typically an outbound request we are about to sign) as a canonical string.
pub fn canonical_string_from_pairs<'a, I>(pairs: I) -> String
where I: IntoIterator<Item = (&'a str, &'a str)> {
    let sorted = pairs.into_iter().filter(|(_, v)| !v.is_empty()).collect::<BTreeMap<&str, &str>>();
    sorted.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<String>>().join("&")
}

fn canonical_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // serde_json's compact writer is infallible for in-memory values
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
