//! RFC 8414: OAuth 2.0 Authorization Server Metadata
//!
//! Provides the `/.well-known/oauth-authorization-server` endpoint that clients
//! use to discover OAuth endpoints and capabilities.

use std::sync::Arc;

use axum::{extract::State, Json};
use oauth_core::{OAuthError, StoreError};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// The authorization server's issuer identifier (URL)
    pub issuer: String,

    /// URL of the token endpoint
    pub token_endpoint: String,

    /// URL of the introspection endpoint
    pub introspection_endpoint: String,

    /// URL of the revocation endpoint
    pub revocation_endpoint: String,

    /// JSON array of OAuth 2.0 grant_type values supported
    pub grant_types_supported: Vec<String>,

    /// Scopes any configured client may be granted
    pub scopes_supported: Vec<String>,

    /// JSON array of client authentication methods supported at token endpoint
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Handler for `GET /.well-known/oauth-authorization-server`
pub async fn handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AuthorizationServerMetadata>, ApiError> {
    // Read from the credential store, which may hold clients the config never listed
    let credentials = state.credentials.clone();
    let scopes = tokio::task::spawn_blocking(move || credentials.client_scopes())
        .await
        .map_err(|e| StoreError::Unavailable(format!("metadata task failed: {e}")))
        .and_then(|scopes| scopes)
        .map_err(OAuthError::from)?;

    let base_url = state.public_url.trim_end_matches('/');

    let metadata = AuthorizationServerMetadata {
        issuer: base_url.to_string(),
        token_endpoint: format!("{}/oauth/token", base_url),
        introspection_endpoint: format!("{}/oauth/check_token", base_url),
        revocation_endpoint: format!("{}/oauth/revoke", base_url),
        grant_types_supported: vec!["password".to_string()],
        scopes_supported: scopes.into_iter().collect(),
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
        ],
    };

    tracing::debug!("Serving authorization server metadata");
    Ok(Json(metadata))
}
