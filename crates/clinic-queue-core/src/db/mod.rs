//! Database layer for the clinic queue.

mod schema;
mod clinics;
mod patients;
mod turns;
mod history;

pub use schema::*;

use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A ticket number (or daily sequence) already exists. Retryable.
    #[error("Duplicate ticket number: {0}")]
    DuplicateTicket(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction, committing only if it succeeds.
    ///
    /// Any error returned by `f` rolls the transaction back.
    pub fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        let tx = self.conn.unchecked_transaction().map_err(DbError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

/// Whether an SQLite error is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => {
            inner.code == ErrorCode::ConstraintViolation
                && (inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Map trigger aborts and CHECK failures to `DbError::Constraint`.
pub(crate) fn constraint_or_sqlite(err: rusqlite::Error) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(inner, msg) if inner.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(msg.clone().unwrap_or_else(|| inner.to_string()))
        }
        _ => DbError::Sqlite(err),
    }
}
