use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HmacAlgorithm {
    Sha256,
    Sha512,
}

/// How a binary digest or signature is written into a header or payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureEncoding {
    Hex,
    Base64,
}

impl SignatureEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => STANDARD.encode(bytes),
        }
    }

    /// Decodes `value`, returning `None` for anything that isn't valid in this encoding. Hex is case-insensitive.
    pub fn decode(&self, value: &str) -> Option<Vec<u8>> {
        let value = value.trim();
        match self {
            Self::Hex => hex::decode(value).ok(),
            Self::Base64 => STANDARD.decode(value).ok(),
        }
    }
}

/// Calculates the HMAC of `data` with the given secret and returns the raw digest bytes.
pub fn calculate_hmac(algorithm: HmacAlgorithm, secret: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    match algorithm {
        HmacAlgorithm::Sha256 => match Hmac::<Sha256>::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            },
            Err(_) => Vec::new(),
        },
        HmacAlgorithm::Sha512 => match Hmac::<Sha512>::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            },
            Err(_) => Vec::new(),
        },
    }
}

/// Checks `expected` against the HMAC of `data` in constant time.
pub fn verify_hmac(algorithm: HmacAlgorithm, secret: &[u8], data: &[u8], expected: &[u8]) -> bool {
    match algorithm {
        HmacAlgorithm::Sha256 => Hmac::<Sha256>::new_from_slice(secret)
            .map(|mut mac| {
                mac.update(data);
                mac.verify_slice(expected).is_ok()
            })
            .unwrap_or(false),
        HmacAlgorithm::Sha512 => Hmac::<Sha512>::new_from_slice(secret)
            .map(|mut mac| {
                mac.update(data);
                mac.verify_slice(expected).is_ok()
            })
            .unwrap_or(false),
    }
}
