//! In-process token store

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::{hash_token, StoredToken, TokenStore};
use crate::error::StoreError;

/// Tokens held in a hash map behind a read/write lock.
///
/// Every mutation is a single insert or remove under the write lock, so
/// readers never observe a partially written token.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    /// Maps token hash -> token data
    tokens: RwLock<HashMap<String, StoredToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for InMemoryTokenStore {
    fn save(&self, token: &StoredToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        match tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    fn lookup_at(
        &self,
        token_value: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredToken>, StoreError> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tokens
            .get(&hash_token(token_value))
            .filter(|t| t.is_active_at(now))
            .cloned())
    }

    fn revoke(&self, token_value: &str) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        Ok(tokens.remove(&hash_token(token_value)).is_some())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let before = tokens.len();
        tokens.retain(|_, t| t.is_active_at(now));
        Ok(before - tokens.len())
    }
}
