//! OAuth 2.0 Token Endpoint
//!
//! Handles the resource-owner password grant. Client credentials come from
//! HTTP Basic or the form body; the user's credentials from the form body.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use oauth_core::{scope::format_scopes, IssuedToken, OAuthError, StoreError, TokenRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::oauth::client_auth::client_credentials;
use crate::oauth::form_body;
use crate::AppState;

/// Token request (form-encoded)
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    /// Grant type, "password" is the only one implemented
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Resource owner username
    #[serde(default)]
    pub username: Option<String>,

    /// Resource owner password
    #[serde(default)]
    pub password: Option<String>,

    /// Requested scopes, space or comma separated
    #[serde(default)]
    pub scope: Option<String>,

    /// Client ID (when not using HTTP Basic)
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (when not using HTTP Basic)
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Successful token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.access_token,
            token_type: issued.token_type.to_string(),
            expires_in: issued.expires_in,
            scope: format_scopes(&issued.scopes),
        }
    }
}

/// Handler for `POST /oauth/token`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Response {
    let issued = match form_body(form) {
        Ok(form) => issue(state, &headers, form).await,
        Err(err) => Err(err),
    };
    match issued {
        Ok(token) => (
            StatusCode::OK,
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(TokenResponse::from(token)),
        )
            .into_response(),
        Err(err) => {
            tracing::info!("Token request rejected: {}", err.code());
            ApiError(err).into_response()
        }
    }
}

async fn issue(
    state: Arc<AppState>,
    headers: &HeaderMap,
    form: TokenForm,
) -> Result<IssuedToken, OAuthError> {
    let client = client_credentials(
        headers,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    )?;

    let grant_type = required(form.grant_type, "grant_type")?;
    let request = TokenRequest {
        client,
        grant_type,
        username: form.username.unwrap_or_default(),
        password: form.password.unwrap_or_default(),
        scope: form.scope,
    };

    // Credential and token stores may block on I/O
    tokio::task::spawn_blocking(move || state.grants.issue(&request))
        .await
        .map_err(|e| {
            OAuthError::StoreUnavailable(StoreError::Unavailable(format!("grant task failed: {e}")))
        })?
}

fn required(value: Option<String>, name: &str) -> Result<String, OAuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest(format!("Missing {} parameter", name)))
}
