//! RFC 7009: OAuth 2.0 Token Revocation
//!
//! A client may revoke only the tokens issued to it. Unknown tokens and
//! tokens of other clients get the same `200 OK`, so the endpoint reveals
//! nothing about tokens the caller does not own.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{HeaderMap, StatusCode},
    Form,
};
use oauth_core::{OAuthError, StoreError};

use crate::error::ApiError;
use crate::oauth::client_auth::client_credentials;
use crate::oauth::form_body;
use crate::oauth::introspect::TokenParam;
use crate::AppState;

/// Handler for `POST /oauth/revoke`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Form<TokenParam>, FormRejection>,
) -> Result<StatusCode, ApiError> {
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

    tokio::task::spawn_blocking(move || {
        let caller = state.grants.authenticate_client(&presented)?;
        match state.tokens.lookup(&token)? {
            Some(stored) if stored.client_id == caller.client_id => {
                state.tokens.revoke(&token)?;
                tracing::info!(
                    "Revoked access token for client {} user {}",
                    stored.client_id,
                    stored.username
                );
            }
            Some(_) => {
                tracing::warn!(
                    "Client {} tried to revoke a token it does not own",
                    caller.client_id
                );
            }
            None => {}
        }
        Ok::<_, OAuthError>(())
    })
    .await
    .map_err(|e| {
        OAuthError::StoreUnavailable(StoreError::Unavailable(format!(
            "revocation task failed: {e}"
        )))
    })??;

    Ok(StatusCode::OK)
}
