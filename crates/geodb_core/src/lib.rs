//! Line-oriented geophysical channel database.
//!
//! Lines hold per-channel sample vectors positioned along a fiducial; this
//! crate owns the catalog, the per-symbol locks and the pipelines that move
//! those vectors in and out of dense arrays.

pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod lock;
pub mod logging;
pub mod model;
pub mod store;

pub use config::{normalize_database_name, DatabaseOptions};
pub use database::{
    ChannelTargets, CoordinateAxis, Database, DeleteMode, DummyMode, LineData, NoopObserver,
    ReadOptions, ScanObserver, ValueScan,
};
pub use error::{GdbError, GdbResult};
pub use lock::{LockManager, LockMode, LockWait};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::channel::{
    ChannelDetails, ChannelFilter, ChannelPatch, ChannelRecord, DisplayFormat, NewChannel,
};
pub use model::element::{Element, ElementType, Samples, TextFormat};
pub use model::fiducial::Fiducial;
pub use model::line::{LineCategory, LineDetails, LinePatch, LineRecord, LineType};
pub use model::symbol::{EntityRef, Symbol, SymbolKind};
pub use model::vector::{ChannelVector, Vector, WideVector};
pub use store::{CatalogStore, MemoryStore, SqliteStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
