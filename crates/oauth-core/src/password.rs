//! Encoded credential matching.
//!
//! Stored secrets and passwords carry an `{id}` prefix naming their encoding:
//! - `{noop}plain`: plaintext, for demonstrations only
//! - `{sha256}hex`: lowercase hex SHA-256 of the raw value
//!
//! Values without a known prefix never match.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const NOOP_PREFIX: &str = "{noop}";
const SHA256_PREFIX: &str = "{sha256}";

/// Check a presented credential against its stored encoding.
pub fn matches(stored: &str, presented: &str) -> bool {
    if let Some(plain) = stored.strip_prefix(NOOP_PREFIX) {
        return plain.as_bytes().ct_eq(presented.as_bytes()).into();
    }

    if let Some(encoded) = stored.strip_prefix(SHA256_PREFIX) {
        let expected = match hex::decode(encoded) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!("Stored {{sha256}} credential is not valid hex");
                return false;
            }
        };
        let actual = Sha256::digest(presented.as_bytes());
        return expected.as_slice().ct_eq(actual.as_slice()).into();
    }

    tracing::warn!("Stored credential has no recognised encoding prefix");
    false
}

/// Encode a raw credential as `{sha256}<hex>`.
pub fn encode_sha256(raw: &str) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(raw.as_bytes())))
}

/// Whether a stored credential is kept in plaintext.
pub fn is_plaintext(stored: &str) -> bool {
    stored.starts_with(NOOP_PREFIX)
}
