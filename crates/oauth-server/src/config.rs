//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use oauth_core::{
    password, AccessPolicy, AccessRule, Client, CredentialStore, Database, GrantType,
    InMemoryTokenStore, SqliteCredentialStore, SqliteTokenStore, StaticCredentialStore,
    TokenStore, User,
};
use serde::{Deserialize, Serialize};

/// Main configuration for the OAuth servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Registered clients (static backend, or seed for an empty database)
    #[serde(default = "default_clients")]
    pub clients: Vec<Client>,

    /// Resource owners (static backend, or seed for an empty database)
    #[serde(default = "default_users")]
    pub users: Vec<User>,

    /// Where clients and users are read from
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Token configuration
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Resource server access rules
    #[serde(default = "default_policy")]
    pub policy: AccessPolicy,

    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// Clients and users from this file
    #[default]
    Static,
    /// Clients and users from a SQLite database
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum TokenBackend {
    /// Tokens live in process memory and die with it
    #[default]
    Memory,
    /// Tokens persisted in a SQLite database
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Access token lifetime in seconds (default: 12 hours)
    #[serde(default = "default_access_token_validity")]
    pub access_token_validity_secs: u64,

    /// How often expired tokens are purged (default: 5 minutes)
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    #[serde(default)]
    pub store: TokenBackend,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_validity_secs: default_access_token_validity(),
            purge_interval_secs: default_purge_interval(),
            store: TokenBackend::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Accept `{noop}` plaintext secrets and passwords (demo parity)
    #[serde(default = "default_true")]
    pub allow_plaintext_credentials: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_plaintext_credentials: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_access_token_validity() -> u64 {
    12 * 3600 // 12 hours
}

fn default_purge_interval() -> u64 {
    300 // 5 minutes
}

fn default_clients() -> Vec<Client> {
    vec![Client {
        client_id: "webapp".to_string(),
        client_secret: "{noop}secret".to_string(),
        authorized_grant_types: [GrantType::Password].into(),
        scopes: ["read", "write", "trust"].map(String::from).into(),
    }]
}

fn default_users() -> Vec<User> {
    vec![
        User {
            username: "user1".to_string(),
            password: "{noop}password".to_string(),
            roles: ["USER".to_string()].into(),
            enabled: true,
        },
        User {
            username: "admin".to_string(),
            password: "{noop}password".to_string(),
            roles: ["ADMIN".to_string()].into(),
            enabled: true,
        },
    ]
}

fn default_policy() -> AccessPolicy {
    AccessPolicy {
        rules: vec![
            AccessRule {
                path: "/resource/endpoint".to_string(),
                permit_all: false,
                scopes: Default::default(),
                roles: ["ADMIN".to_string()].into(),
            },
            AccessRule {
                path: "/resource/me".to_string(),
                permit_all: false,
                scopes: ["read".to_string()].into(),
                roles: Default::default(),
            },
        ],
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            users: default_users(),
            credentials: CredentialsConfig::default(),
            tokens: TokenConfig::default(),
            policy: default_policy(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        let config = if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            config
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            // Create config directory if it doesn't exist
            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject or warn about plaintext credentials per `security`
    pub fn validate(&self) -> Result<()> {
        let plaintext = self
            .clients
            .iter()
            .filter(|c| password::is_plaintext(&c.client_secret))
            .map(|c| format!("client {}", c.client_id))
            .chain(
                self.users
                    .iter()
                    .filter(|u| password::is_plaintext(&u.password))
                    .map(|u| format!("user {}", u.username)),
            )
            .collect::<Vec<_>>();

        self.token_ttl()?;
        self.check_plaintext(&plaintext)
    }

    /// Warn about plaintext entries, or reject them when they are disabled
    fn check_plaintext(&self, plaintext: &[String]) -> Result<()> {
        if plaintext.is_empty() {
            return Ok(());
        }
        if !self.security.allow_plaintext_credentials {
            bail!(
                "Plaintext {{noop}} credentials are disabled but configured for: {}",
                plaintext.join(", ")
            );
        }
        for entry in plaintext {
            tracing::warn!("{} uses a plaintext {{noop}} credential", entry);
        }
        Ok(())
    }

    /// Access token lifetime, rejected when tokens would expire past the clock's range
    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        let secs = self.tokens.access_token_validity_secs;
        let ttl = i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some());
        match ttl {
            Some(ttl) => Ok(ttl),
            None => bail!("tokens.access_token_validity_secs {} is out of range", secs),
        }
    }

    /// Build the configured credential store, seeding an empty database
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        match &self.credentials {
            CredentialsConfig::Static => Ok(Arc::new(StaticCredentialStore::new(
                self.clients.clone(),
                self.users.clone(),
            ))),
            CredentialsConfig::Sqlite { path } => {
                let db = Arc::new(
                    Database::open(path)
                        .with_context(|| format!("Failed to open credential database {:?}", path))?,
                );
                let store = SqliteCredentialStore::new(db)?;
                if store.is_empty()? {
                    for client in &self.clients {
                        store.insert_client(client)?;
                    }
                    for user in &self.users {
                        store.insert_user(user)?;
                    }
                    tracing::info!(
                        "Seeded credential database with {} clients and {} users",
                        self.clients.len(),
                        self.users.len()
                    );
                }
                // Rows written by earlier runs or other tools count too
                self.check_plaintext(&store.plaintext_entries()?)
                    .with_context(|| format!("Credential database {:?}", path))?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Build the configured token store
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        match &self.tokens.store {
            TokenBackend::Memory => Ok(Arc::new(InMemoryTokenStore::new())),
            TokenBackend::Sqlite { path } => {
                let db = Arc::new(
                    Database::open(path)
                        .with_context(|| format!("Failed to open token database {:?}", path))?,
                );
                Ok(Arc::new(SqliteTokenStore::new(db)?))
            }
        }
    }
}
