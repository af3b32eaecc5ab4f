//! Resource-server access guard.
//!
//! Access rules are plain data: a path pattern mapped to the scopes and roles
//! a caller must hold. The guard resolves the bearer token through a
//! `TokenIntrospector` and checks the first matching rule.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::OAuthError;
use crate::introspect::TokenIntrospector;
use crate::scope::ScopeSet;

/// Identity resolved from a valid bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub client_id: String,
    pub scopes: ScopeSet,
    pub roles: BTreeSet<String>,
}

/// One entry of the access policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    /// Exact path, or a prefix ending in `/**`
    pub path: String,
    /// Allow anonymous access
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub permit_all: bool,
    /// Every listed scope must be granted to the token
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: ScopeSet,
    /// Every listed role must belong to the token's user
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
}

impl AccessRule {
    pub fn matches(&self, path: &str) -> bool {
        match self.path.strip_suffix("/**") {
            Some(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => self.path == path,
        }
    }

    fn is_satisfied_by(&self, principal: &Principal) -> bool {
        self.scopes.is_subset(&principal.scopes) && self.roles.is_subset(&principal.roles)
    }
}

/// Ordered access rules; the first matching rule wins.
///
/// Paths matched by no rule require an authenticated caller and nothing more.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn rule_for(&self, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|r| r.matches(path))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, OAuthError> {
    let header = header.ok_or(OAuthError::Unauthenticated)?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(OAuthError::Unauthenticated)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(OAuthError::Unauthenticated);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(OAuthError::Unauthenticated);
    }
    Ok(token)
}

/// Decides whether a request may reach a protected route
pub struct AccessGuard {
    introspector: Arc<dyn TokenIntrospector>,
    policy: AccessPolicy,
}

impl AccessGuard {
    pub fn new(introspector: Arc<dyn TokenIntrospector>, policy: AccessPolicy) -> Self {
        Self {
            introspector,
            policy,
        }
    }

    /// Authorize a request for `path` carrying `authorization`.
    ///
    /// Returns `Ok(None)` for `permit_all` routes. A missing, malformed,
    /// unknown or expired token is always `Unauthenticated`; `Forbidden` is
    /// only returned for a valid token lacking a scope or role.
    pub async fn authorize(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<Option<Principal>, OAuthError> {
        let rule = self.policy.rule_for(path);
        if rule.is_some_and(|r| r.permit_all) {
            return Ok(None);
        }

        let token = bearer_token(authorization)?;
        let principal = self
            .introspector
            .introspect(token)
            .await?
            .into_principal()
            .ok_or(OAuthError::Unauthenticated)?;

        if let Some(rule) = rule {
            if !rule.is_satisfied_by(&principal) {
                tracing::debug!(
                    "Denied {} to {} (needs scopes {:?} roles {:?})",
                    path,
                    principal.username,
                    rule.scopes,
                    rule.roles
                );
                return Err(OAuthError::Forbidden);
            }
        }

        tracing::debug!("Granted {} to {}", path, principal.username);
        Ok(Some(principal))
    }
}
