//! RFC 7662: OAuth 2.0 Token Introspection
//!
//! Used by standalone resource servers to validate bearer tokens against
//! this server's token store. Callers must authenticate as a client.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::HeaderMap,
    Form, Json,
};
use oauth_core::{Introspection, OAuthError, StoreError};
use serde::Deserialize;

use crate::error::ApiError;
use crate::oauth::client_auth::client_credentials;
use crate::oauth::form_body;
use crate::AppState;

/// Introspection / revocation request (form-encoded)
#[derive(Debug, Deserialize)]
pub struct TokenParam {
    #[serde(default)]
    pub token: Option<String>,

    /// Accepted per RFC 7662, only access tokens exist here
    #[serde(default)]
    #[allow(dead_code)]
    pub token_type_hint: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Handler for `POST /oauth/check_token`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Form<TokenParam>, FormRejection>,
) -> Result<Json<Introspection>, ApiError> {
    let params = form_body(params)?;
    let presented = client_credentials(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    )?;
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("Missing token parameter".into()))?;

    let result = tokio::task::spawn_blocking(move || {
        let caller = state.grants.authenticate_client(&presented)?;
        let result = state.introspector.introspect_now(&token)?;
        tracing::debug!(
            "Client {} introspected a token (active: {})",
            caller.client_id,
            result.active
        );
        Ok::<_, OAuthError>(result)
    })
    .await
    .map_err(|e| {
        OAuthError::StoreUnavailable(StoreError::Unavailable(format!(
            "introspection task failed: {e}"
        )))
    })??;

    Ok(Json(result))
}
