//! Credential store backed by SQLite tables.
//!
//! Uses the classic JDBC client/user schema: `oauth_client_details` with
//! comma-separated scope and grant columns, `users`, and `authorities` rows
//! carrying a `ROLE_` prefix.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use super::{split_list, Client, CredentialStore, GrantType, User};
use crate::db::Database;
use crate::error::StoreError;
use crate::password;
use crate::scope::ScopeSet;

const ROLE_PREFIX: &str = "ROLE_";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS oauth_client_details (
        client_id TEXT PRIMARY KEY,
        client_secret TEXT NOT NULL,
        scope TEXT NOT NULL DEFAULT '',
        authorized_grant_types TEXT NOT NULL DEFAULT ''
    );
    CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1
    );
    CREATE TABLE IF NOT EXISTS authorities (
        username TEXT NOT NULL REFERENCES users(username),
        authority TEXT NOT NULL,
        UNIQUE (username, authority)
    );
";

/// Clients and users read from a database on every lookup
pub struct SqliteCredentialStore {
    db: Arc<Database>,
}

impl SqliteCredentialStore {
    /// Wrap `db`, creating the credential tables if they do not exist
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        db.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(Self { db })
    }

    /// Insert or replace a client row
    pub fn insert_client(&self, client: &Client) -> Result<(), StoreError> {
        let scope = join(client.scopes.iter().map(String::as_str));
        let grants = join(client.authorized_grant_types.iter().map(GrantType::as_str));
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO oauth_client_details
                    (client_id, client_secret, scope, authorized_grant_types)
                 VALUES (?1, ?2, ?3, ?4)",
                params![client.client_id, client.client_secret, scope, grants],
            )
        })?;
        Ok(())
    }

    /// Insert or replace a user together with its authorities
    pub fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO users (username, password, enabled) VALUES (?1, ?2, ?3)",
                params![user.username, user.password, user.enabled],
            )?;
            tx.execute(
                "DELETE FROM authorities WHERE username = ?1",
                params![user.username],
            )?;
            for role in &user.roles {
                tx.execute(
                    "INSERT INTO authorities (username, authority) VALUES (?1, ?2)",
                    params![user.username, format!("{}{}", ROLE_PREFIX, role)],
                )?;
            }
            tx.commit()
        })
    }

    /// Clients and users whose stored credential is plaintext `{noop}`
    pub fn plaintext_entries(&self) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut entries = plaintext_rows(
                conn,
                "SELECT client_id, client_secret FROM oauth_client_details ORDER BY client_id",
                "client",
            )?;
            entries.extend(plaintext_rows(
                conn,
                "SELECT username, password FROM users ORDER BY username",
                "user",
            )?);
            Ok(entries)
        })
    }

    /// Whether no client rows exist yet
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let count: i64 = self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM oauth_client_details", [], |row| row.get(0))
        })?;
        Ok(count == 0)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn client_scopes(&self) -> Result<ScopeSet, StoreError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT scope FROM oauth_client_details")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>();
            rows
        })?;
        Ok(rows
            .iter()
            .flat_map(|raw| split_list(raw).map(str::to_string))
            .collect())
    }

    fn find_client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT client_secret, scope, authorized_grant_types
                 FROM oauth_client_details WHERE client_id = ?1",
                params![client_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
        })?;

        Ok(row.map(|(client_secret, scope, grants)| {
            let authorized_grant_types = split_list(&grants)
                .filter_map(|g| match g.parse::<GrantType>() {
                    Ok(grant) => Some(grant),
                    Err(_) => {
                        tracing::warn!(
                            "Ignoring unknown grant type {:?} for client {}",
                            g,
                            client_id
                        );
                        None
                    }
                })
                .collect();
            Client {
                client_id: client_id.to_string(),
                client_secret,
                authorized_grant_types,
                scopes: split_list(&scope).map(str::to_string).collect(),
            }
        }))
    }

    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.db.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT password, enabled FROM users WHERE username = ?1",
                    params![username],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
                )
                .optional()?;

            let Some((password, enabled)) = user else {
                return Ok(None);
            };

            let mut stmt =
                conn.prepare("SELECT authority FROM authorities WHERE username = ?1")?;
            let roles = stmt
                .query_map(params![username], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(|authority| match authority.strip_prefix(ROLE_PREFIX) {
                    Some(role) => role.to_string(),
                    None => authority,
                })
                .collect::<BTreeSet<_>>();

            Ok(Some(User {
                username: username.to_string(),
                password,
                roles,
                enabled,
            }))
        })
    }
}

fn plaintext_rows(
    conn: &Connection,
    sql: &str,
    kind: &str,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, credential) = row?;
        if password::is_plaintext(&credential) {
            entries.push(format!("{} {}", kind, id));
        }
    }
    Ok(entries)
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}
