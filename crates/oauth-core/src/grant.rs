//! Resource-owner password grant (RFC 6749 section 4.3)

use std::sync::Arc;

use chrono::{Duration, SubsecRound, Utc};

use crate::credentials::{CredentialStore, GrantType, User};
use crate::error::{OAuthError, StoreError};
use crate::scope::{self, ScopeSet};
use crate::token::{generate_token_value, hash_token, StoredToken, TokenStore};

/// Attempts at minting a token whose hash is not already stored
const MAX_MINT_ATTEMPTS: usize = 3;

/// Client id and secret as presented on the token request
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// A parsed token request
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub client: ClientCredentials,
    pub grant_type: String,
    pub username: String,
    pub password: String,
    /// Raw scope parameter, comma or space separated
    pub scope: Option<String>,
}

/// A freshly minted token, as returned to the client
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub scopes: ScopeSet,
}

/// Stands in for a missing user; no password hashes to all zeros
fn placeholder_user() -> User {
    User {
        username: String::new(),
        password: format!("{{sha256}}{}", "0".repeat(64)),
        roles: Default::default(),
        enabled: true,
    }
}

/// Authenticates token requests and mints bearer tokens.
pub struct GrantHandler {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    ttl: Duration,
}

impl GrantHandler {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            tokens,
            ttl,
        }
    }

    /// Authenticate a client by id and secret
    pub fn authenticate_client(
        &self,
        presented: &ClientCredentials,
    ) -> Result<crate::credentials::Client, OAuthError> {
        let client = self
            .credentials
            .find_client(&presented.client_id)?
            .ok_or_else(|| {
                tracing::debug!("Unknown client {}", presented.client_id);
                OAuthError::InvalidClient
            })?;

        if !self
            .credentials
            .verify_client_secret(&client, &presented.client_secret)
        {
            tracing::debug!("Bad secret for client {}", presented.client_id);
            return Err(OAuthError::InvalidClient);
        }
        Ok(client)
    }

    /// Authenticate a resource owner.
    ///
    /// Unknown usernames are checked against a placeholder credential so the
    /// lookup costs the same whether or not the user exists.
    fn authenticate_user(&self, username: &str, password: &str) -> Result<User, OAuthError> {
        let user = self.credentials.find_user(username)?;
        let verified = match &user {
            Some(user) => self.credentials.verify_user_password(user, password),
            None => {
                self.credentials.verify_user_password(&placeholder_user(), password);
                false
            }
        };

        match user {
            Some(user) if verified => Ok(user),
            _ => {
                tracing::debug!("Rejected resource owner credentials for {}", username);
                Err(OAuthError::InvalidGrant)
            }
        }
    }

    /// Process a token request: authenticate, narrow scopes, mint and store.
    pub fn issue(&self, request: &TokenRequest) -> Result<IssuedToken, OAuthError> {
        let client = self.authenticate_client(&request.client)?;

        let grant_type = request
            .grant_type
            .parse::<GrantType>()
            .ok()
            .filter(|g| client.authorized_grant_types.contains(g))
            .ok_or_else(|| OAuthError::UnauthorizedGrant(request.grant_type.clone()))?;
        if grant_type != GrantType::Password {
            return Err(OAuthError::UnsupportedGrantType(request.grant_type.clone()));
        }

        let user = self.authenticate_user(&request.username, &request.password)?;

        let scopes = scope::narrow(request.scope.as_deref(), &client.scopes)?;

        let now = Utc::now().trunc_subsecs(3);
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            tracing::error!("Token lifetime {} overflows the clock", self.ttl);
            StoreError::Unavailable("token lifetime out of range".into())
        })?;

        for _ in 0..MAX_MINT_ATTEMPTS {
            let access_token = generate_token_value();
            let record = StoredToken {
                token_hash: hash_token(&access_token),
                client_id: client.client_id.clone(),
                username: user.username.clone(),
                scopes: scopes.clone(),
                roles: user.roles.clone(),
                issued_at: now,
                expires_at,
            };

            match self.tokens.save(&record) {
                Ok(()) => {
                    tracing::info!(
                        "Issued access token for client {} user {}",
                        client.client_id,
                        user.username
                    );
                    return Ok(IssuedToken {
                        access_token,
                        token_type: "bearer",
                        expires_in: record.expires_in(now),
                        scopes,
                    });
                }
                Err(StoreError::Duplicate) => {
                    tracing::warn!("Token hash collision, minting again");
                }
                Err(err) => {
                    tracing::error!("Failed to store access token: {}", err);
                    return Err(err.into());
                }
            }
        }

        Err(StoreError::Unavailable("could not mint a unique token".into()).into())
    }
}
