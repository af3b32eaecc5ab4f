//! OAuth2 password-grant authorization server and resource server
//!
//! Provides:
//! - Token endpoint for the resource-owner password grant
//! - RFC 7662 token introspection and RFC 7009 revocation
//! - RFC 8414 authorization server metadata
//! - Bearer-protected resource routes guarded by an access policy
//!
//! The library exposes the routers so integration tests can drive them
//! without binding a socket.

pub mod config;
pub mod error;
pub mod oauth;
pub mod resource;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use oauth_core::{AccessGuard, CredentialStore, GrantHandler, LocalIntrospector, TokenStore};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared authorization server state
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<dyn CredentialStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub grants: GrantHandler,
    pub introspector: LocalIntrospector,
    pub public_url: String,
}

impl AppState {
    /// Build stores and handlers from configuration
    pub fn from_config(config: Config, public_url: impl Into<String>) -> Result<Self> {
        let credentials = config.credential_store()?;
        let tokens = config.token_store()?;
        let grants = GrantHandler::new(credentials.clone(), tokens.clone(), config.token_ttl()?);
        let introspector = LocalIntrospector::new(tokens.clone());

        Ok(Self {
            config,
            credentials,
            tokens,
            grants,
            introspector,
            public_url: public_url.into(),
        })
    }

    /// Guard for resource routes co-hosted with this authorization server
    pub fn local_guard(&self) -> AccessGuard {
        AccessGuard::new(
            Arc::new(LocalIntrospector::new(self.tokens.clone())),
            self.config.policy.clone(),
        )
    }
}

/// Authorization server routes
pub fn authorization_router(state: Arc<AppState>) -> Router {
    Router::new()
        // OAuth metadata (RFC 8414)
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::metadata::handler),
        )
        // Token endpoint
        .route("/oauth/token", post(oauth::token::handler))
        // Introspection (RFC 7662)
        .route("/oauth/check_token", post(oauth::introspect::handler))
        // Revocation (RFC 7009)
        .route("/oauth/revoke", post(oauth::revoke::handler))
        .with_state(state)
}

/// Authorization server with co-hosted resource routes sharing its token store
pub fn combined_router(state: Arc<AppState>) -> Router {
    let guard = Arc::new(state.local_guard());
    authorization_router(state)
        .merge(resource::router(guard))
        .layer(TraceLayer::new_for_http())
}

/// Periodically drop expired tokens from the store
pub fn spawn_token_purge(
    tokens: Arc<dyn TokenStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let tokens = tokens.clone();
            let purged =
                tokio::task::spawn_blocking(move || tokens.purge_expired(chrono::Utc::now())).await;
            match purged {
                Ok(Ok(0)) => {}
                Ok(Ok(count)) => tracing::info!("Cleaned up {} expired tokens", count),
                Ok(Err(e)) => tracing::warn!("Failed to purge expired tokens: {}", e),
                Err(e) => tracing::warn!("Token purge task failed: {}", e),
            }
        }
    })
}
