//! Shared SQLite handle for the database-backed stores

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, ErrorCode};

use crate::error::StoreError;

/// A single SQLite connection guarded by a mutex.
///
/// The lock is held only for the duration of one statement or transaction.
/// Transient failures (busy, locked, I/O) trigger one reconnect and retry.
pub struct Database {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let conn = Connection::open(&path)?;
        tracing::info!("Opened credential/token database at {:?}", path);
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Run `op` against the connection, reconnecting once on a transient error.
    pub fn with_conn<T>(
        &self,
        op: impl Fn(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock();
        match op(&mut *conn) {
            Ok(value) => Ok(value),
            Err(err) if is_transient(&err) => {
                tracing::warn!("Transient database error, reconnecting: {}", err);
                *conn = Connection::open(&self.path)?;
                op(&mut *conn).map_err(StoreError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Every operation is a single statement or transaction, so a panic
        // while the lock was held cannot leave partial state behind.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
        ),
        _ => false,
    }
}

/// True when `err` is a uniqueness violation on insert.
pub(crate) fn is_constraint_violation(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
    )
}
