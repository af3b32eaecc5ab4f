//! OAuth2 password-grant authorization server and resource server
//!
//! Modes:
//! - `serve`: authorization server with co-hosted resource routes
//! - `resource`: standalone resource server validating tokens remotely
//! - `hash-password`: print a `{sha256}` encoded credential

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::{Args, Parser, Subcommand};
use oauth_core::{password, AccessGuard};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oauth_server::config::Config;
use oauth_server::resource::remote::RemoteIntrospector;
use oauth_server::{combined_router, resource, spawn_token_purge, AppState};

#[derive(Parser, Debug)]
#[command(name = "oauth-server")]
#[command(about = "OAuth2 password-grant authorization and resource server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the authorization server with co-hosted resource routes
    Serve {
        #[command(flatten)]
        listen: Listen,

        /// Public URL for this service (used in OAuth metadata)
        #[arg(long, env = "OAUTH_PUBLIC_URL")]
        public_url: Option<String>,
    },
    /// Run a standalone resource server that introspects tokens remotely
    Resource {
        #[command(flatten)]
        listen: Listen,

        /// Authorization server introspection endpoint
        #[arg(long, env = "OAUTH_INTROSPECTION_URL")]
        introspection_url: String,

        /// Client id used to authenticate introspection calls
        #[arg(long, env = "OAUTH_CLIENT_ID")]
        client_id: String,

        /// Client secret used to authenticate introspection calls
        #[arg(long, env = "OAUTH_CLIENT_SECRET")]
        client_secret: String,

        /// Introspection request timeout in seconds
        #[arg(long, default_value_t = 5, env = "OAUTH_INTROSPECTION_TIMEOUT")]
        timeout_secs: u64,
    },
    /// Print a {sha256} encoding of a secret or password
    HashPassword {
        /// The raw secret
        raw: String,
    },
}

#[derive(Args, Debug)]
struct Listen {
    /// Port to listen on
    #[arg(long, default_value_t = 8080, env = "OAUTH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "OAUTH_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "/config", env = "OAUTH_CONFIG_PATH")]
    config_path: String,
}

impl Listen {
    fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind, self.port).parse()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "oauth_server=info,oauth_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { listen, public_url } => {
            let addr = listen.addr()?;
            let config = Config::load(&listen.config_path)?;
            let public_url = public_url.unwrap_or_else(|| format!("http://{}", addr));
            let purge_every = Duration::from_secs(config.tokens.purge_interval_secs.max(1));

            let state = Arc::new(AppState::from_config(config, public_url.clone())?);
            let purge = spawn_token_purge(state.tokens.clone(), purge_every);

            tracing::info!("Starting authorization server on {}", addr);
            tracing::info!("Public URL: {}", public_url);
            run(addr, combined_router(state)).await?;
            purge.abort();
        }
        Command::Resource {
            listen,
            introspection_url,
            client_id,
            client_secret,
            timeout_secs,
        } => {
            let addr = listen.addr()?;
            let config = Config::load(&listen.config_path)?;
            let introspector = RemoteIntrospector::new(
                introspection_url.clone(),
                client_id,
                client_secret,
                Duration::from_secs(timeout_secs),
            )?;
            let guard = Arc::new(AccessGuard::new(Arc::new(introspector), config.policy));

            tracing::info!("Starting resource server on {}", addr);
            tracing::info!("Introspecting tokens at {}", introspection_url);
            run(addr, resource::router(guard).layer(TraceLayer::new_for_http())).await?;
        }
        Command::HashPassword { raw } => {
            println!("{}", password::encode_sha256(&raw));
        }
    }

    Ok(())
}

async fn run(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
