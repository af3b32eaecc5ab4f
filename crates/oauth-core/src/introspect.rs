//! Token introspection (RFC 7662)
//!
//! The resource side never touches the token store directly; it asks a
//! `TokenIntrospector`, which is either the shared in-process store or a
//! remote authorization server.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::guard::Principal;
use crate::scope::{format_scopes, parse_scopes};
use crate::token::{StoredToken, TokenStore};

/// Introspection response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Space-delimited scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Introspection {
    /// Response for a missing, expired or revoked token
    pub fn inactive() -> Self {
        Self {
            active: false,
            client_id: None,
            username: None,
            scope: None,
            roles: BTreeSet::new(),
            token_type: None,
            exp: None,
            iat: None,
        }
    }

    /// The identity carried by an active token
    pub fn into_principal(self) -> Option<Principal> {
        if !self.active {
            return None;
        }
        Some(Principal {
            username: self.username?,
            client_id: self.client_id.unwrap_or_default(),
            scopes: self.scope.as_deref().map(parse_scopes).unwrap_or_default(),
            roles: self.roles,
        })
    }
}

impl From<StoredToken> for Introspection {
    fn from(token: StoredToken) -> Self {
        Self {
            active: true,
            client_id: Some(token.client_id),
            username: Some(token.username),
            scope: Some(format_scopes(&token.scopes)),
            roles: token.roles,
            token_type: Some("bearer".to_string()),
            exp: Some(token.expires_at.timestamp()),
            iat: Some(token.issued_at.timestamp()),
        }
    }
}

/// Resolves a bearer token value to its current state
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, token_value: &str) -> Result<Introspection, StoreError>;
}

/// Introspects against a token store shared with the authorization server
pub struct LocalIntrospector {
    tokens: Arc<dyn TokenStore>,
}

impl LocalIntrospector {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    /// Synchronous lookup used by the introspection endpoint itself
    pub fn introspect_now(&self, token_value: &str) -> Result<Introspection, StoreError> {
        lookup(self.tokens.as_ref(), token_value)
    }
}

fn lookup(tokens: &dyn TokenStore, token_value: &str) -> Result<Introspection, StoreError> {
    Ok(tokens
        .lookup_at(token_value, Utc::now())?
        .map(Introspection::from)
        .unwrap_or_else(Introspection::inactive))
}

#[async_trait]
impl TokenIntrospector for LocalIntrospector {
    /// Store lookups may block on disk, so they run on the blocking pool.
    async fn introspect(&self, token_value: &str) -> Result<Introspection, StoreError> {
        let tokens = self.tokens.clone();
        let token_value = token_value.to_string();
        tokio::task::spawn_blocking(move || lookup(tokens.as_ref(), &token_value))
            .await
            .map_err(|e| StoreError::Unavailable(format!("introspection task failed: {e}")))?
    }
}
