//! HTTP mapping of `OAuthError`

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use oauth_core::OAuthError;
use serde::Serialize;

/// Error response body (RFC 6749 section 5.2)
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// An `OAuthError` on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub OAuthError);

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OAuthError::InvalidClient | OAuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            OAuthError::Forbidden => StatusCode::FORBIDDEN,
            OAuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OAuthError::InvalidRequest(_)
            | OAuthError::UnauthorizedGrant(_)
            | OAuthError::UnsupportedGrantType(_)
            | OAuthError::InvalidGrant
            | OAuthError::InvalidScope(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn challenge(&self) -> Option<&'static str> {
        match &self.0 {
            OAuthError::InvalidClient => Some("Basic realm=\"oauth\""),
            OAuthError::Unauthenticated => Some("Bearer error=\"invalid_token\""),
            OAuthError::Forbidden => Some("Bearer error=\"insufficient_scope\""),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let OAuthError::StoreUnavailable(source) = &self.0 {
            // Store details stay in the log, never in the response
            tracing::error!("Backing store unavailable: {}", source);
        }

        let status = self.status();
        let challenge = self.challenge();
        let body = ErrorBody {
            error: self.0.code().to_string(),
            error_description: Some(self.0.to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth_core::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (OAuthError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (OAuthError::InvalidClient, StatusCode::UNAUTHORIZED),
            (OAuthError::UnauthorizedGrant("password".into()), StatusCode::BAD_REQUEST),
            (OAuthError::InvalidGrant, StatusCode::BAD_REQUEST),
            (OAuthError::InvalidScope("x".into()), StatusCode::BAD_REQUEST),
            (OAuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (OAuthError::Forbidden, StatusCode::FORBIDDEN),
            (
                OAuthError::StoreUnavailable(StoreError::Unavailable("db".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_challenge_headers() {
        let response = ApiError(OAuthError::InvalidClient).into_response();
        assert!(response.headers()[header::WWW_AUTHENTICATE]
            .to_str()
            .unwrap()
            .starts_with("Basic"));

        let response = ApiError(OAuthError::Unauthenticated).into_response();
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Bearer error=\"invalid_token\""
        );

        let response = ApiError(OAuthError::InvalidGrant).into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
