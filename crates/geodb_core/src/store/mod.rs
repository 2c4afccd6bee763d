//! Storage backend contracts and implementations.
//!
//! # Responsibility
//! - Define the opaque catalog/vector service the database core depends on.
//! - Keep persistence details (SQL, snapshots) inside the backend boundary.
//!
//! # Invariants
//! - Backends allocate symbols monotonically and never hand one out twice,
//!   even across `discard`.
//! - Name lookups are case-insensitive per symbol kind.
//! - Deleting a symbol deletes every stored vector that references it.

use crate::db::DbError;
use crate::model::channel::ChannelRecord;
use crate::model::line::LineRecord;
use crate::model::symbol::{Symbol, SymbolKind};
use crate::model::vector::ChannelVector;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Persisted state cannot be decoded, or a request references unknown rows.
    InvalidData(String),
    Serialization(serde_json::Error),
    /// Shared in-memory state was poisoned by a panicking thread.
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Serialization(err) => write!(f, "sample serialization failed: {err}"),
            Self::Poisoned => write!(f, "store state poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) | Self::Poisoned => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Catalog and vector storage used by [`crate::Database`].
pub trait CatalogStore {
    /// Looks up a symbol by name (case-insensitive).
    fn find_symbol(&self, kind: SymbolKind, name: &str) -> StoreResult<Option<Symbol>>;
    /// Returns the stored name of a symbol of `kind`.
    fn symbol_name(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<Option<String>>;
    /// Number of entities of `kind`.
    fn count(&self, kind: SymbolKind) -> StoreResult<usize>;

    fn insert_line(&self, record: &LineRecord) -> StoreResult<Symbol>;
    fn line(&self, symbol: Symbol) -> StoreResult<Option<LineRecord>>;
    fn update_line(&self, symbol: Symbol, record: &LineRecord) -> StoreResult<()>;
    /// Lists `(symbol, record)` for all lines, or only selected ones.
    fn lines(&self, selected_only: bool) -> StoreResult<Vec<(Symbol, LineRecord)>>;

    fn insert_channel(&self, record: &ChannelRecord) -> StoreResult<Symbol>;
    fn channel(&self, symbol: Symbol) -> StoreResult<Option<ChannelRecord>>;
    fn update_channel(&self, symbol: Symbol, record: &ChannelRecord) -> StoreResult<()>;
    fn channels(&self) -> StoreResult<Vec<(Symbol, ChannelRecord)>>;

    /// Deletes a symbol and its data; returns `false` when it did not exist.
    fn delete_symbol(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<bool>;

    /// Stored vector for (line, channel), `None` when nothing was written.
    fn vector(&self, line: Symbol, channel: Symbol) -> StoreResult<Option<ChannelVector>>;
    /// Replaces the stored vector for (line, channel).
    fn put_vector(&self, line: Symbol, channel: Symbol, vector: &ChannelVector)
        -> StoreResult<()>;

    fn property(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_property(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Makes pending changes durable.
    fn commit(&self) -> StoreResult<()>;
    /// Drops pending changes back to the last commit.
    fn discard(&self) -> StoreResult<()>;

    /// Backing file, `None` for in-memory stores.
    fn location(&self) -> Option<PathBuf>;
}
