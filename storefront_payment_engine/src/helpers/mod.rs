mod canonical;
mod hmac_digest;
mod rsa_signature;
mod signature_verifier;

pub use canonical::{canonical_string, canonical_string_from_pairs};
pub use hmac_digest::{calculate_hmac, verify_hmac, HmacAlgorithm, SignatureEncoding};
pub use rsa_signature::{parse_private_key, parse_public_key, AsymmetricAlgorithm, RsaKeyError};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use signature_verifier::{CallbackHeaders, SignatureLocation, SignatureVerifier, SECURITY_LOG_TARGET};
