//! Connection bootstrap.
//!
//! # Invariants
//! - Returned connections enforce foreign keys and carry the latest schema.
//! - `open_db` never creates a file; `create_db` never reuses one.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
enum OpenMode {
    Existing,
    Create,
    Memory,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Existing => "file",
            Self::Create => "create",
            Self::Memory => "memory",
        }
    }
}

/// Opens an existing database file, migrating it when it is behind.
///
/// # Errors
/// - `DbError::MissingFile` when `path` does not exist.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(rejected(OpenMode::Existing, DbError::MissingFile(path.to_path_buf())));
    }
    connect(OpenMode::Existing, || {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    })
}

/// Creates a database file with the full schema.
///
/// # Errors
/// - `DbError::FileExists` when `path` already exists.
pub fn create_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if path.exists() {
        return Err(rejected(OpenMode::Create, DbError::FileExists(path.to_path_buf())));
    }
    connect(OpenMode::Create, || Connection::open(path))
}

/// Opens a private in-memory database with the full schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    connect(OpenMode::Memory, Connection::open_in_memory)
}

fn rejected(mode: OpenMode, err: DbError) -> DbError {
    error!(
        "event=db_open module=db status=error mode={} error_code=db_path_rejected error={}",
        mode.as_str(),
        err
    );
    err
}

fn connect(
    mode: OpenMode,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = open()
        .map_err(DbError::from)
        .and_then(|mut conn| prepare(&mut conn).map(|from_version| (conn, from_version)));

    match result {
        Ok((conn, from_version)) => {
            info!(
                "event=db_open module=db status=ok mode={} from_version={} duration_ms={}",
                mode.as_str(),
                from_version,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<u32> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
