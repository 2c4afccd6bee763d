//! Open database handle.
//!
//! # Responsibility
//! - Tie one catalog store to the lock table shared by all of its handles.
//! - Host the catalog, read, write and value-scan operations.
//!
//! # Invariants
//! - Every handle is its own lock holder; dropping a handle releases every
//!   lock it still owns.
//! - Locks are taken per operation through RAII guards and never outlive the
//!   call that took them.
//! - The handle is explicit: there is no process-wide current database.

mod catalog;
mod read;
mod scan;
mod write;

pub use catalog::{CoordinateAxis, DeleteMode};
pub use read::{DummyMode, LineData, ReadOptions};
pub use scan::{NoopObserver, ScanObserver, ValueScan};
pub use write::ChannelTargets;

use crate::config::{normalize_database_name, DatabaseOptions};
use crate::error::{GdbError, GdbResult};
use crate::lock::{HolderId, LockManager, LockMode, SymbolLockGuard};
use crate::model::channel::ChannelRecord;
use crate::model::line::LineRecord;
use crate::model::symbol::{EntityRef, Symbol, SymbolKind};
use crate::store::{CatalogStore, MemoryStore, SqliteStore, StoreError};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const INSTANCE_ID_KEY: &str = "instance_id";
const MAX_LINES_KEY: &str = "max_lines";
const MAX_CHANNELS_KEY: &str = "max_channels";

/// Handle on one channel database.
pub struct Database<S: CatalogStore> {
    store: S,
    locks: Arc<LockManager>,
    holder: HolderId,
    options: DatabaseOptions,
    instance_id: Uuid,
}

impl Database<SqliteStore> {
    /// Opens an existing database file.
    ///
    /// Capacities recorded when the file was created take precedence over
    /// those in `options`.
    pub fn open(path: impl AsRef<Path>, options: &DatabaseOptions) -> GdbResult<Self> {
        let store = SqliteStore::open(path.as_ref())?;
        Self::with_store(store, options)
    }

    /// Creates a new database file, adding the `.gdb` extension when missing.
    pub fn create(path: impl AsRef<Path>, options: &DatabaseOptions) -> GdbResult<Self> {
        let path = normalize_database_name(path);
        let store = SqliteStore::create(&path)?;
        Self::with_store(store, options)
    }
}

impl Database<MemoryStore> {
    /// Scratch database with default options.
    pub fn in_memory() -> GdbResult<Self> {
        Self::with_store(MemoryStore::new(), &DatabaseOptions::default())
    }
}

impl<S: CatalogStore + Clone> Database<S> {
    /// Opens another handle on the same store and lock table.
    ///
    /// The new handle is a separate lock holder, so it contends with `self`
    /// like any other user of the database.
    pub fn share(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: Arc::clone(&self.locks),
            holder: self.locks.register_holder(),
            options: self.options,
            instance_id: self.instance_id,
        }
    }
}

impl<S: CatalogStore> Database<S> {
    /// Wraps an arbitrary store.
    ///
    /// A store without database properties is initialised with a fresh
    /// instance id and the capacities of `options`, and that initialisation
    /// is committed right away.
    pub fn with_store(store: S, options: &DatabaseOptions) -> GdbResult<Self> {
        let mut options = options.normalized();
        let mut initialised = false;

        let instance_id = match store.property(INSTANCE_ID_KEY)? {
            Some(value) => Uuid::parse_str(&value).map_err(|err| {
                StoreError::InvalidData(format!("bad instance id `{value}`: {err}"))
            })?,
            None => {
                let id = Uuid::new_v4();
                store.set_property(INSTANCE_ID_KEY, &id.to_string())?;
                initialised = true;
                id
            }
        };

        match stored_capacity(&store, MAX_LINES_KEY)? {
            Some(limit) => options.max_lines = limit,
            None => {
                store.set_property(MAX_LINES_KEY, &options.max_lines.to_string())?;
                initialised = true;
            }
        }
        match stored_capacity(&store, MAX_CHANNELS_KEY)? {
            Some(limit) => options.max_channels = limit,
            None => {
                store.set_property(MAX_CHANNELS_KEY, &options.max_channels.to_string())?;
                initialised = true;
            }
        }
        if initialised {
            store.commit()?;
        }

        let locks = Arc::new(LockManager::new());
        let holder = locks.register_holder();
        info!(
            "event=db_open module=database status=ok instance_id={} initialised={} max_lines={} max_channels={}",
            instance_id, initialised, options.max_lines, options.max_channels
        );

        Ok(Self {
            store,
            locks,
            holder,
            options,
            instance_id,
        })
    }

    /// Makes pending changes durable.
    pub fn commit(&self) -> GdbResult<()> {
        self.store.commit()?;
        info!(
            "event=db_commit module=database status=ok instance_id={}",
            self.instance_id
        );
        Ok(())
    }

    /// Drops every change since the last commit.
    pub fn discard(&self) -> GdbResult<()> {
        self.store.discard()?;
        info!(
            "event=db_discard module=database status=ok instance_id={}",
            self.instance_id
        );
        Ok(())
    }

    /// Backing file, `None` for in-memory databases.
    pub fn file_name(&self) -> Option<PathBuf> {
        self.store.location()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Lock table shared by all handles of this database.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn lock(&self, symbol: Symbol, mode: LockMode) -> GdbResult<SymbolLockGuard<'_>> {
        Ok(self
            .locks
            .acquire(self.holder, symbol, mode, self.options.lock_wait)?)
    }

    /// Releases everything this handle holds.
    pub(crate) fn release_all_locks(&self) {
        self.locks.release_all(self.holder);
    }

    /// Resolves a plain name or symbol without creating anything.
    pub(crate) fn lookup(
        &self,
        kind: SymbolKind,
        entity: &EntityRef,
    ) -> GdbResult<Option<(String, Symbol)>> {
        let symbol = match entity {
            EntityRef::Name(name) => match self.store.find_symbol(kind, name)? {
                Some(symbol) => symbol,
                None => return Ok(None),
            },
            EntityRef::Symbol(symbol) => *symbol,
        };
        Ok(self
            .store
            .symbol_name(kind, symbol)?
            .map(|name| (name, symbol)))
    }

    pub(crate) fn line_record(&self, symbol: Symbol) -> GdbResult<LineRecord> {
        self.store
            .line(symbol)?
            .ok_or_else(|| GdbError::not_found(SymbolKind::Line, symbol.to_string()))
    }

    pub(crate) fn channel_record(&self, symbol: Symbol) -> GdbResult<ChannelRecord> {
        self.store
            .channel(symbol)?
            .ok_or_else(|| GdbError::not_found(SymbolKind::Channel, symbol.to_string()))
    }
}

impl<S: CatalogStore> Drop for Database<S> {
    fn drop(&mut self) {
        self.locks.release_all(self.holder);
    }
}

fn stored_capacity<S: CatalogStore>(store: &S, key: &str) -> GdbResult<Option<usize>> {
    match store.property(key)? {
        Some(value) => match value.parse::<usize>() {
            Ok(limit) => Ok(Some(limit)),
            Err(_) => {
                warn!(
                    "event=db_open module=database status=degraded key={} error_code=bad_capacity",
                    key
                );
                Ok(None)
            }
        },
        None => Ok(None),
    }
}
