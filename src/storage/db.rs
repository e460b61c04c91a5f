//! Database handle and schema setup.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

/// Current schema version, written to `PRAGMA user_version` after migration.
const SCHEMA_VERSION: i64 = 6;

/// Infrastructure failures surfaced by the store.
///
/// Expected business outcomes (duplicate username, rejected insert) are not
/// errors; they come back as [`crate::account::SignupOutcome`] values.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("database read failed: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("database write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("malformed stored record: {0}")]
    Decode(String),
}

/// True when an error is the engine rejecting a write that would break a
/// uniqueness constraint. Callers that treat the constraint as the source of
/// truth turn this into a graceful failure instead of propagating it.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Shared handle to the open SQLite database.
///
/// Cloning is cheap; all clones use the same connection, so every store
/// built from the same handle sees the same data. Tests open isolated
/// in-memory handles instead of sharing process-wide state.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at `path` and bring the schema up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::Open)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(StoreError::Open)?;
        // WAL keeps readers unblocked while a write is in flight.
        let _: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(StoreError::Open)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an isolated in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Open)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(StoreError::Open)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Apply the schema batch if the on-disk version is behind. All DDL is
    /// `IF NOT EXISTS`, so a partially created schema is completed rather
    /// than failed.
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(StoreError::Open)?;
        if version < SCHEMA_VERSION {
            tracing::debug!(from = version, to = SCHEMA_VERSION, "migrating schema");
            conn.execute_batch(include_str!("schema.sql"))
                .map_err(StoreError::Open)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(StoreError::Open)?;
        }
        Ok(())
    }

    /// Run `f` with the locked connection.
    pub(crate) fn with_conn<T, F>(&self, f: F) -> rusqlite::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Read an application setting.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
        })
        .map_err(StoreError::Read)
    }

    /// Write an application setting, replacing any previous value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                rusqlite::params![key, value, updated_at],
            )
            .map(|_| ())
        })
        .map_err(StoreError::Write)
    }
}
