//! Core of the OAuth2 password-grant demo.
//!
//! Provides:
//! - Credential stores for clients and resource owners (static tables or SQLite)
//! - Token stores keyed by token hash (in-memory or SQLite)
//! - The password grant handler that authenticates and mints bearer tokens
//! - The access guard used by resource servers to authorize requests
//!
//! Nothing here knows about HTTP; the `oauth-server` crate maps these types
//! onto axum routes.

pub mod credentials;
pub mod db;
pub mod error;
pub mod grant;
pub mod guard;
pub mod introspect;
pub mod password;
pub mod scope;
pub mod token;

pub use credentials::{
    Client, CredentialStore, GrantType, SqliteCredentialStore, StaticCredentialStore, User,
};
pub use db::Database;
pub use error::{OAuthError, StoreError};
pub use grant::{ClientCredentials, GrantHandler, IssuedToken, TokenRequest};
pub use guard::{bearer_token, AccessGuard, AccessPolicy, AccessRule, Principal};
pub use introspect::{Introspection, LocalIntrospector, TokenIntrospector};
pub use scope::ScopeSet;
pub use token::{InMemoryTokenStore, SqliteTokenStore, StoredToken, TokenStore};
