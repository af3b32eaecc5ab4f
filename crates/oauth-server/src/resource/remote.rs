//! Token introspection against a remote authorization server

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use oauth_core::{Introspection, StoreError, TokenIntrospector};

/// Calls `POST /oauth/check_token` on the authorization server.
///
/// Connection failures and timeouts are retried once; any remaining failure
/// surfaces as `StoreError::Unavailable`.
pub struct RemoteIntrospector {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl RemoteIntrospector {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build introspection HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    async fn request(&self, token_value: &str) -> reqwest::Result<Introspection> {
        self.http
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token_value)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl TokenIntrospector for RemoteIntrospector {
    async fn introspect(&self, token_value: &str) -> Result<Introspection, StoreError> {
        let result = match self.request(token_value).await {
            Err(e) if e.is_connect() || e.is_timeout() => {
                tracing::warn!("Introspection request failed, retrying once: {}", e);
                self.request(token_value).await
            }
            other => other,
        };

        result.map_err(|e| {
            tracing::error!("Introspection at {} failed: {}", self.endpoint, e);
            StoreError::Unavailable(e.to_string())
        })
    }
}
