//! OAuth 2.0 authorization server endpoints
//!
//! Implements:
//! - RFC 6749 section 4.3: Resource Owner Password Credentials grant
//! - RFC 7662: Token Introspection
//! - RFC 7009: Token Revocation
//! - RFC 8414: Authorization Server Metadata

pub mod client_auth;
pub mod introspect;
pub mod metadata;
pub mod revoke;
pub mod token;

use axum::extract::rejection::FormRejection;
use axum::Form;
use oauth_core::OAuthError;

/// Unwrap a form body, reporting a missing content type or an unparsable
/// body as `invalid_request`
pub(crate) fn form_body<T>(form: Result<Form<T>, FormRejection>) -> Result<T, OAuthError> {
    match form {
        Ok(Form(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!("Rejected form body: {}", rejection);
            Err(OAuthError::InvalidRequest(rejection.body_text()))
        }
    }
}
