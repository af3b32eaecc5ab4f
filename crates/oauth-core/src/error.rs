//! Error taxonomy shared by the authorization and resource servers.

use thiserror::Error;

/// Failures of a backing store (credential or token).
///
/// These are infrastructure faults, never credential faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("a token with this hash is already stored")]
    Duplicate,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a rejected token or resource request.
///
/// All variants except `StoreUnavailable` are deterministic results of the
/// request's input and are reported to the caller as-is.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Bad client credentials")]
    InvalidClient,
    #[error("Unauthorized grant type: {0}")]
    UnauthorizedGrant(String),
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),
    #[error("Bad credentials")]
    InvalidGrant,
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Full authentication is required to access this resource")]
    Unauthenticated,
    #[error("Insufficient scope or role for this resource")]
    Forbidden,
    #[error("Service temporarily unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl OAuthError {
    /// The RFC 6749 / RFC 6750 error code reported on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::UnauthorizedGrant(_) => "unauthorized_client",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::InvalidGrant => "invalid_grant",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::Unauthenticated => "invalid_token",
            OAuthError::Forbidden => "insufficient_scope",
            OAuthError::StoreUnavailable(_) => "temporarily_unavailable",
        }
    }
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        OAuthError::StoreUnavailable(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_becomes_unavailable() {
        let err: OAuthError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.code(), "temporarily_unavailable");
        // The public message never carries store internals
        assert!(!err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_credential_errors_map_to_distinct_codes() {
        assert_eq!(OAuthError::InvalidClient.code(), "invalid_client");
        assert_eq!(OAuthError::InvalidGrant.code(), "invalid_grant");
        assert_eq!(OAuthError::Unauthenticated.code(), "invalid_token");
        assert_eq!(OAuthError::Forbidden.code(), "insufficient_scope");
        assert_eq!(
            OAuthError::UnauthorizedGrant("implicit".into()).code(),
            "unauthorized_client"
        );
    }
}
