//! RSA (PKCS#1 v1.5) signing and verification over canonical strings.
//!
//! PalmPay's scheme (`Md5RsaSha1`) does not sign the canonical string directly. The string is first reduced to its
//! upper-case hex MD5 digest, and *that* 32-character text is signed with RSA-SHA1. `RsaSha256` signs the canonical
//! string itself.
use md5::{Digest, Md5};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey},
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    signature::{SignatureEncoding as _, Signer, Verifier},
    RsaPrivateKey,
    RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RsaKeyError {
    #[error("Invalid RSA key: {0}")]
    InvalidKey(String),
    #[error("Could not create signature: {0}")]
    SigningFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsymmetricAlgorithm {
    /// `RSA-SHA1( upper_hex( MD5(canonical) ) )`
    Md5RsaSha1,
    /// `RSA-SHA256( canonical )`
    RsaSha256,
}

impl AsymmetricAlgorithm {
    /// The bytes that are actually fed to the RSA signature for the given canonical string.
    pub fn message(&self, canonical: &str) -> Vec<u8> {
        match self {
            Self::Md5RsaSha1 => hex::encode_upper(Md5::digest(canonical.as_bytes())).into_bytes(),
            Self::RsaSha256 => canonical.as_bytes().to_vec(),
        }
    }

    /// Whether a `signType` value announced in a payload names this algorithm.
    pub fn matches_sign_type(&self, sign_type: &str) -> bool {
        let sign_type = sign_type.trim().to_ascii_uppercase();
        match self {
            Self::Md5RsaSha1 => matches!(sign_type.as_str(), "RSA" | "RSA-SHA1" | "SHA1WITHRSA" | "MD5RSASHA1"),
            Self::RsaSha256 => matches!(sign_type.as_str(), "RSA2" | "RSA-SHA256" | "SHA256WITHRSA" | "RSASHA256"),
        }
    }

    pub fn sign(&self, key: &RsaPrivateKey, canonical: &str) -> Result<Vec<u8>, RsaKeyError> {
        let message = self.message(canonical);
        let signature = match self {
            Self::Md5RsaSha1 => SigningKey::<Sha1>::new(key.clone()).try_sign(&message),
            Self::RsaSha256 => SigningKey::<Sha256>::new(key.clone()).try_sign(&message),
        }
        .map_err(|e| RsaKeyError::SigningFailed(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Verifies `signature` over `canonical`. Any malformed input is simply a failed verification.
    pub fn verify(&self, key: &RsaPublicKey, canonical: &str, signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        let message = self.message(canonical);
        match self {
            Self::Md5RsaSha1 => VerifyingKey::<Sha1>::new(key.clone()).verify(&message, &signature).is_ok(),
            Self::RsaSha256 => VerifyingKey::<Sha256>::new(key.clone()).verify(&message, &signature).is_ok(),
        }
    }
}

/// Parses a private key given either as a full PEM document (PKCS#8 or PKCS#1) or as the bare base64 body of a
/// PKCS#8 key, which is how merchant dashboards usually hand them out. Literal `\n` sequences, common when keys are
/// stored in environment variables, are accepted as line breaks.
pub fn parse_private_key(key: &str) -> Result<RsaPrivateKey, RsaKeyError> {
    let pem = normalize_pem(key, "PRIVATE KEY");
    RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|e| RsaKeyError::InvalidKey(e.to_string()))
}

/// Parses a public key given as an SPKI or PKCS#1 PEM document, or as the bare base64 body of an SPKI key.
pub fn parse_public_key(key: &str) -> Result<RsaPublicKey, RsaKeyError> {
    let pem = normalize_pem(key, "PUBLIC KEY");
    RsaPublicKey::from_public_key_pem(&pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
        .map_err(|e| RsaKeyError::InvalidKey(e.to_string()))
}

fn normalize_pem(key: &str, label: &str) -> String {
    let key = key.trim().replace("\\n", "\n");
    if key.starts_with("-----BEGIN") {
        return key;
    }
    let body = key.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let lines = body.as_bytes().chunks(64).map(String::from_utf8_lossy).collect::<Vec<_>>().join("\n");
    format!("-----BEGIN {label}-----\n{lines}\n-----END {label}-----\n")
}
