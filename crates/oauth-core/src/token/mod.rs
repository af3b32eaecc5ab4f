//! Access token records and their stores

mod memory;
mod sqlite;

pub use memory::InMemoryTokenStore;
pub use sqlite::SqliteTokenStore;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::scope::ScopeSet;

/// Length of generated token values
pub const TOKEN_LENGTH: usize = 48;

/// An issued access token.
///
/// Keyed by the hash of the token value; the raw value is only ever returned
/// to the client that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token_hash: String,
    pub client_id: String,
    pub username: String,
    pub scopes: ScopeSet,
    /// Roles of the user at issue time
    pub roles: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Valid strictly before `expires_at`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whole seconds remaining at `now`, zero once expired
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

/// Mapping from token value to token record.
///
/// `save` is atomic: a token is either fully visible or not at all. Lookups
/// treat expired tokens exactly like missing ones.
pub trait TokenStore: Send + Sync {
    /// Insert a new token; `StoreError::Duplicate` if its hash already exists
    fn save(&self, token: &StoredToken) -> Result<(), StoreError>;

    /// Find the live token for `token_value` as of `now`
    fn lookup_at(
        &self,
        token_value: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredToken>, StoreError>;

    /// Remove a token; returns whether it existed
    fn revoke(&self, token_value: &str) -> Result<bool, StoreError>;

    /// Drop every token expired as of `now`; returns how many were removed
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn lookup(&self, token_value: &str) -> Result<Option<StoredToken>, StoreError> {
        self.lookup_at(token_value, Utc::now())
    }
}

/// Generate a cryptographically secure random token value
pub fn generate_token_value() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hash a token value for storage (raw tokens are never stored)
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, digest)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_generated_values_are_distinct_and_alphanumeric() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_hides_value() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert!(!hash_token("abc").contains("abc"));
    }

    #[test]
    fn test_expires_in_clamps_at_zero() {
        let now = Utc::now();
        let token = fixtures::token("x", now, 30);
        assert_eq!(token.expires_in(now), 30);
        assert_eq!(token.expires_in(now + Duration::seconds(90)), 0);
        assert!(!token.is_active_at(token.expires_at));
    }
}
