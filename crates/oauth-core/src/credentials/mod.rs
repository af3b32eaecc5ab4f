//! Client and resource-owner credential stores

mod memory;
mod sqlite;

pub use memory::StaticCredentialStore;
pub use sqlite::SqliteCredentialStore;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, StoreError};
use crate::password;
use crate::scope::ScopeSet;

/// OAuth2 grant types a client may be authorized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Password,
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
    Implicit,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Implicit => "implicit",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(GrantType::Password),
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "implicit" => Ok(GrantType::Implicit),
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }
}

/// An application allowed to request tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    /// Encoded secret, e.g. `{noop}secret` or `{sha256}...`
    pub client_secret: String,
    pub authorized_grant_types: BTreeSet<GrantType>,
    #[serde(default)]
    pub scopes: ScopeSet,
}

/// A resource owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Encoded password, same format as client secrets
    pub password: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Read-only lookup of clients and users.
///
/// A missing client or user is `Ok(None)`, not an error; callers turn it into
/// `invalid_client` or `invalid_grant`. `Err` means the backing store failed.
pub trait CredentialStore: Send + Sync {
    fn find_client(&self, client_id: &str) -> Result<Option<Client>, StoreError>;

    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Every scope at least one client may be granted
    fn client_scopes(&self) -> Result<ScopeSet, StoreError>;

    fn verify_client_secret(&self, client: &Client, provided: &str) -> bool {
        password::matches(&client.client_secret, provided)
    }

    /// Disabled users never verify.
    fn verify_user_password(&self, user: &User, provided: &str) -> bool {
        user.enabled && password::matches(&user.password, provided)
    }
}

/// Split a stored comma-separated list (JDBC-style columns).
pub(crate) fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
