//! Bearer-protected resource routes
//!
//! Every route passes through the access guard first. The guard either
//! rejects the request (401/403/503) or attaches the resolved `Principal` to
//! the request extensions for the handler.

pub mod remote;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use oauth_core::{AccessGuard, Principal};

use crate::error::ApiError;

/// Body of the protected placeholder endpoint
pub const PROTECTED_PAYLOAD: &str = "resource protected by the resource server";

/// Resource routes behind the access guard
pub fn router(guard: Arc<AccessGuard>) -> Router {
    Router::new()
        .route("/resource/endpoint", get(endpoint))
        .route("/resource/me", get(me))
        .route_layer(middleware::from_fn_with_state(guard, require_access))
}

/// Guard middleware
///
/// Returns 401 for a missing or invalid token, 403 when the token lacks a
/// required scope or role, and passes the request on otherwise.
async fn require_access(
    State(guard): State<Arc<AccessGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let authorization = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                tracing::debug!("Invalid Authorization header encoding");
                return ApiError(oauth_core::OAuthError::Unauthenticated).into_response();
            }
        },
        None => None,
    };

    match guard.authorize(&path, authorization.as_deref()).await {
        Ok(Some(principal)) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(err) => {
            tracing::debug!("Access to {} denied: {}", path, err.code());
            ApiError(err).into_response()
        }
    }
}

/// Handler for `GET /resource/endpoint`
async fn endpoint() -> &'static str {
    PROTECTED_PAYLOAD
}

/// Handler for `GET /resource/me`: the identity behind the bearer token
async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
