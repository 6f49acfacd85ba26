//! Database module for Aurora.
//!
//! Provides SQLite connection management and migrations for the contact store
//! and alert history. The database is stored at `~/.aurora/aurora.db`.

pub mod contacts;
pub mod history;
pub mod migrations;
pub mod schema;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::database::migrations::run_migrations;

pub use contacts::{normalise_phone, Contact, ContactSource};
pub use history::{AlertRecord, DispatchOutcome};

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to create database directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Invalid contact: {0}")]
    InvalidContact(String),

    #[error("Reorder must list every contact exactly once: {0}")]
    InvalidReorder(String),

    #[error("Failed to encode record: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Returns the path to the Aurora data directory (~/.aurora).
fn get_aurora_directory() -> Result<PathBuf, DatabaseError> {
    let home = dirs::home_dir().ok_or_else(|| {
        DatabaseError::DirectoryCreation(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        ))
    })?;

    Ok(home.join(".aurora"))
}

/// Returns the path to the database file (~/.aurora/aurora.db).
pub fn get_database_path() -> Result<PathBuf, DatabaseError> {
    Ok(get_aurora_directory()?.join("aurora.db"))
}

/// A migrated SQLite connection shared by the contact store and alert history.
///
/// Access is serialised through a mutex; every operation is a short
/// synchronous statement or transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created data directory at {:?}", parent);
            }
        }

        tracing::info!("Opening database at {:?}", path);
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens the database at the default location.
    pub fn open_default() -> Result<Self, DatabaseError> {
        Self::open(&get_database_path()?)
    }

    /// Opens a private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }
}
