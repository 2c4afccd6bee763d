//! SQLite bootstrap for the file-backed catalog store.
//!
//! # Responsibility
//! - Open, create and configure SQLite connections.
//! - Bring every connection to the newest catalog schema before use.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - No catalog table is read or written on a connection whose migrations
//!   failed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{create_db, open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Connection bootstrap failures.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer schema than this build knows.
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    /// Opening requires an existing database file.
    MissingFile(PathBuf),
    /// Creating refuses to overwrite an existing file.
    FileExists(PathBuf),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion { found, supported } => write!(
                f,
                "channel database schema {found} is newer than this build supports ({supported})"
            ),
            Self::MissingFile(path) => write!(f, "no database at {}", path.display()),
            Self::FileExists(path) => write!(f, "{} already exists", path.display()),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingFile(_) | Self::FileExists(_) => {
                None
            }
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
