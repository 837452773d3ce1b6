//! # Inbound callback verification
//!
//! A [`SignatureVerifier`] decides whether a callback body was really produced by the payment provider that claims
//! to have sent it. Two strategies are supported:
//!
//! * **Shared-secret HMAC**. The HMAC of the *raw body bytes, exactly as received* is compared (in constant time)
//!   with the digest in a request header. Re-serializing the JSON before hashing would break the check, so the body
//!   must never be parsed and re-encoded before it reaches the verifier.
//! * **Asymmetric signature**. The body is parsed as a JSON object and reduced to its
//!   [canonical string](super::canonical_string), leaving out the signature field. The provider's signature (taken
//!   from a payload field or a header) is then checked against that string with the provider's public key.
//!
//! `verify` returns `false` for every kind of malformed input and never panics.
use log::*;
use rsa::RsaPublicKey;
use serde_json::{Map, Value};
use spg_common::Secret;

use super::{
    canonical::canonical_string,
    hmac_digest::{verify_hmac, HmacAlgorithm, SignatureEncoding},
    rsa_signature::AsymmetricAlgorithm,
};

pub const SECURITY_LOG_TARGET: &str = "spg::security";

/// The request headers of a callback, with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackHeaders {
    headers: Vec<(String, String)>,
}

impl CallbackHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.headers.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackHeaders {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let headers = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { headers }
    }
}

/// Where the provider puts its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureLocation {
    Header(String),
    /// A top-level field of the JSON body. The field is excluded from the canonical string.
    Field(String),
}

#[derive(Clone)]
pub enum SignatureVerifier {
    Hmac {
        algorithm: HmacAlgorithm,
        secret: Secret<String>,
        header: String,
        encoding: SignatureEncoding,
    },
    Asymmetric {
        algorithm: AsymmetricAlgorithm,
        public_key: RsaPublicKey,
        location: SignatureLocation,
        encoding: SignatureEncoding,
        /// The payload field that names the signing algorithm, if the provider sends one.
        sign_type_field: Option<String>,
    },
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac { algorithm, header, encoding, .. } => {
                write!(f, "HmacVerifier({algorithm:?}, header: {header}, {encoding:?})")
            },
            Self::Asymmetric { algorithm, location, encoding, .. } => {
                write!(f, "AsymmetricVerifier({algorithm:?}, {location:?}, {encoding:?})")
            },
        }
    }
}

impl SignatureVerifier {
    pub fn hmac(algorithm: HmacAlgorithm, secret: Secret<String>, header: &str, encoding: SignatureEncoding) -> Self {
        Self::Hmac { algorithm, secret, header: header.to_string(), encoding }
    }

    pub fn asymmetric(
        algorithm: AsymmetricAlgorithm,
        public_key: RsaPublicKey,
        location: SignatureLocation,
        encoding: SignatureEncoding,
    ) -> Self {
        Self::Asymmetric { algorithm, public_key, location, encoding, sign_type_field: None }
    }

    pub fn with_sign_type_field(self, field: &str) -> Self {
        match self {
            Self::Asymmetric { algorithm, public_key, location, encoding, .. } => Self::Asymmetric {
                algorithm,
                public_key,
                location,
                encoding,
                sign_type_field: Some(field.to_string()),
            },
            hmac => hmac,
        }
    }

    /// Returns true if and only if `raw_body` carries a valid signature from the configured provider.
    pub fn verify(&self, raw_body: &[u8], headers: &CallbackHeaders) -> bool {
        match self {
            Self::Hmac { algorithm, secret, header, encoding } => {
                verify_with_hmac(*algorithm, secret, header, *encoding, raw_body, headers)
            },
            Self::Asymmetric { algorithm, public_key, location, encoding, sign_type_field } => {
                let payload = match serde_json::from_slice::<Value>(raw_body) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) | Err(_) => {
                        debug!("🔐️ Callback body is not a JSON object. Cannot verify the signature.");
                        return false;
                    },
                };
                verify_with_public_key(
                    *algorithm,
                    public_key,
                    location,
                    *encoding,
                    sign_type_field.as_deref(),
                    &payload,
                    headers,
                )
            },
        }
    }
}

fn verify_with_hmac(
    algorithm: HmacAlgorithm,
    secret: &Secret<String>,
    header: &str,
    encoding: SignatureEncoding,
    raw_body: &[u8],
    headers: &CallbackHeaders,
) -> bool {
    if secret.is_empty() {
        warn!(target: SECURITY_LOG_TARGET, "🔐️ No HMAC secret is configured. All callbacks will be rejected.");
        return false;
    }
    let Some(provided) = headers.get(header) else {
        debug!("🔐️ Signature header '{header}' is missing");
        return false;
    };
    let Some(provided) = encoding.decode(provided) else {
        debug!("🔐️ Signature header '{header}' is not valid {encoding:?}");
        return false;
    };
    verify_hmac(algorithm, secret.reveal().as_bytes(), raw_body, &provided)
}

fn verify_with_public_key(
    algorithm: AsymmetricAlgorithm,
    public_key: &RsaPublicKey,
    location: &SignatureLocation,
    encoding: SignatureEncoding,
    sign_type_field: Option<&str>,
    payload: &Map<String, Value>,
    headers: &CallbackHeaders,
) -> bool {
    match sign_type_field.and_then(|field| payload.get(field)) {
        None | Some(Value::Null) => {},
        Some(Value::String(sign_type)) if algorithm.matches_sign_type(sign_type) => {},
        Some(other) => {
            debug!("🔐️ Payload announces signType {other}, but {algorithm:?} is configured");
            return false;
        },
    }
    let (provided, excluded) = match location {
        SignatureLocation::Header(name) => (headers.get(name).map(str::to_string), None),
        SignatureLocation::Field(name) => {
            (payload.get(name).and_then(Value::as_str).map(str::to_string), Some(name.as_str()))
        },
    };
    let Some(provided) = provided else {
        debug!("🔐️ No signature found at {location:?}");
        return false;
    };
    let Some(signature) = decode_signature(&provided, encoding) else {
        debug!("🔐️ The signature is not valid {encoding:?}");
        return false;
    };
    let exclude = excluded.into_iter().collect::<Vec<&str>>();
    let canonical = canonical_string(payload, &exclude);
    trace!("🔐️ Canonical string for verification: {canonical}");
    algorithm.verify(public_key, &canonical, &signature)
}

/// Some providers URL-encode base64 signatures (`+`, `/` and `=` arrive as `%2B`, `%2F` and `%3D`).
fn decode_signature(value: &str, encoding: SignatureEncoding) -> Option<Vec<u8>> {
    encoding.decode(value).or_else(|| {
        let unescaped = urlencoding::decode(value).ok()?;
        encoding.decode(&unescaped)
    })
}
