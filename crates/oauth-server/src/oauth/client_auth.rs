//! Client authentication at the token, introspection and revocation endpoints
//!
//! Clients authenticate with HTTP Basic (`client_secret_basic`) or with
//! `client_id` / `client_secret` form fields (`client_secret_post`).

use axum::http::{header, HeaderMap};
use base64::Engine;
use oauth_core::{ClientCredentials, OAuthError};

/// Extract client credentials, preferring the Authorization header.
pub fn client_credentials(
    headers: &HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> Result<ClientCredentials, OAuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| {
            tracing::debug!("Invalid Authorization header encoding");
            OAuthError::InvalidClient
        })?;
        return parse_basic(value);
    }

    match (form_client_id, form_client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }),
        _ => {
            tracing::debug!("No client credentials presented");
            Err(OAuthError::InvalidClient)
        }
    }
}

fn parse_basic(value: &str) -> Result<ClientCredentials, OAuthError> {
    let (scheme, encoded) = value.split_once(' ').ok_or(OAuthError::InvalidClient)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        tracing::debug!("Authorization header is not Basic");
        return Err(OAuthError::InvalidClient);
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| OAuthError::InvalidClient)?;
    let decoded = String::from_utf8(decoded).map_err(|_| OAuthError::InvalidClient)?;
    let (client_id, client_secret) = decoded.split_once(':').ok_or(OAuthError::InvalidClient)?;

    Ok(ClientCredentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}

/// Encode a `Basic` Authorization header value
pub fn basic_header(client_id: &str, client_secret: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", encoded)
}
