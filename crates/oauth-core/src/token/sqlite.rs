//! Token store persisted in SQLite

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{hash_token, StoredToken, TokenStore};
use crate::db::{is_constraint_violation, Database};
use crate::error::StoreError;
use crate::scope::{format_scopes, parse_scopes};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS oauth_access_token (
        token_hash TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        username TEXT NOT NULL,
        scope TEXT NOT NULL,
        roles TEXT NOT NULL,
        issued_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS oauth_access_token_expiry ON oauth_access_token (expires_at);
";

/// One row per token; timestamps are stored as Unix milliseconds.
pub struct SqliteTokenStore {
    db: Arc<Database>,
}

impl SqliteTokenStore {
    /// Wrap `db`, creating the token table if it does not exist
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        db.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(Self { db })
    }
}

impl TokenStore for SqliteTokenStore {
    fn save(&self, token: &StoredToken) -> Result<(), StoreError> {
        let scope = format_scopes(&token.scopes);
        let roles = format_scopes(&token.roles);
        let result = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO oauth_access_token
                    (token_hash, client_id, username, scope, roles, issued_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    token.token_hash,
                    token.client_id,
                    token.username,
                    scope,
                    roles,
                    token.issued_at.timestamp_millis(),
                    token.expires_at.timestamp_millis(),
                ],
            )
        });

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(err),
        }
    }

    fn lookup_at(
        &self,
        token_value: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredToken>, StoreError> {
        let token_hash = hash_token(token_value);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT token_hash, client_id, username, scope, roles, issued_at, expires_at
                 FROM oauth_access_token
                 WHERE token_hash = ?1 AND expires_at > ?2",
                params![token_hash, now.timestamp_millis()],
                read_token,
            )
            .optional()
        })
    }

    fn revoke(&self, token_value: &str) -> Result<bool, StoreError> {
        let token_hash = hash_token(token_value);
        let removed = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM oauth_access_token WHERE token_hash = ?1",
                params![token_hash],
            )
        })?;
        Ok(removed > 0)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM oauth_access_token WHERE expires_at <= ?1",
                params![now.timestamp_millis()],
            )
        })
    }
}

fn read_token(row: &Row<'_>) -> rusqlite::Result<StoredToken> {
    Ok(StoredToken {
        token_hash: row.get(0)?,
        client_id: row.get(1)?,
        username: row.get(2)?,
        scopes: parse_scopes(&row.get::<_, String>(3)?),
        roles: parse_scopes(&row.get::<_, String>(4)?),
        issued_at: millis_to_datetime(row.get(5)?),
        expires_at: millis_to_datetime(row.get(6)?),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::fixtures;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> SqliteTokenStore {
        let db = Arc::new(Database::open(dir.path().join("tokens.db")).unwrap());
        SqliteTokenStore::new(db).unwrap()
    }

    #[test]
    fn test_store_contract() {
        let dir = TempDir::new().unwrap();
        fixtures::exercise_store(&open_store(&dir));
    }

    #[test]
    fn test_tokens_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        open_store(&dir)
            .save(&fixtures::token("durable", now, 600))
            .unwrap();

        let reopened = open_store(&dir);
        let token = reopened.lookup_at("durable", now).unwrap().unwrap();
        assert_eq!(token.username, "user1");
        assert!(token.scopes.contains("write"));
        assert!(token.roles.contains("USER"));
    }
}
