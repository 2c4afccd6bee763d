//! Database-wide options.
//!
//! # Invariants
//! - Capacities never drop below `MIN_LINES` / `MIN_CHANNELS`.
//! - Database files always carry the `.gdb` extension.

use crate::lock::LockWait;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_LINES: usize = 500;
pub const DEFAULT_MAX_CHANNELS: usize = 200;
pub const MIN_LINES: usize = 10;
pub const MIN_CHANNELS: usize = 25;
pub const DATABASE_EXTENSION: &str = "gdb";

/// Capacity and locking behaviour of an open database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    pub max_lines: usize,
    pub max_channels: usize,
    pub lock_wait: LockWait,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_channels: DEFAULT_MAX_CHANNELS,
            lock_wait: LockWait::Infinite,
        }
    }
}

impl DatabaseOptions {
    pub fn with_capacity(max_lines: usize, max_channels: usize) -> Self {
        Self {
            max_lines,
            max_channels,
            ..Self::default()
        }
        .normalized()
    }

    pub fn with_lock_wait(self, lock_wait: LockWait) -> Self {
        Self { lock_wait, ..self }
    }

    /// Raises capacities below the minimums.
    pub fn normalized(self) -> Self {
        Self {
            max_lines: self.max_lines.max(MIN_LINES),
            max_channels: self.max_channels.max(MIN_CHANNELS),
            ..self
        }
    }
}

/// Appends `.gdb` unless the path already ends with it (any case).
pub fn normalize_database_name(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DATABASE_EXTENSION));
    if has_extension {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(DATABASE_EXTENSION);
    PathBuf::from(name)
}
