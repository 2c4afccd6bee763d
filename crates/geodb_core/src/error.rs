//! Public error type for database operations.
//!
//! # Invariants
//! - Errors carry the entity name (or symbol) and mode needed to act on them.
//! - Locks taken by the failing operation are already released when an error
//!   reaches the caller.

use crate::lock::{LockError, LockMode};
use crate::model::fiducial::InvalidFiducial;
use crate::model::symbol::{Symbol, SymbolKind};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GdbResult<T> = Result<T, GdbError>;

/// Errors returned by [`crate::Database`] operations.
#[derive(Debug)]
pub enum GdbError {
    /// Name or symbol does not resolve.
    NotFound { kind: SymbolKind, name: String },
    /// Strict creation hit an existing entity.
    AlreadyExists { kind: SymbolKind, name: String },
    /// Name violates the naming grammar of its kind.
    InvalidName {
        kind: SymbolKind,
        name: String,
        reason: &'static str,
    },
    /// Shape, mode or value mismatch.
    InvalidArgument(String),
    /// First requested column has no data or no valid fiducial.
    EmptyChannel { channel: String, line: String },
    /// Lock acquisition could not proceed.
    LockFailure {
        symbol: Symbol,
        mode: LockMode,
        reason: String,
    },
    /// Channel is write protected.
    ChannelProtected { channel: String },
    /// Catalog capacity configured in `DatabaseOptions` is exhausted.
    CapacityExceeded { kind: SymbolKind, limit: usize },
    /// Storage backend failure.
    Store(StoreError),
}

impl Display for GdbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, name } => write!(f, "{kind} '{name}' not found"),
            Self::AlreadyExists { kind, name } => write!(f, "{kind} '{name}' already exists"),
            Self::InvalidName { kind, name, reason } => {
                write!(f, "invalid {kind} name '{name}': {reason}")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::EmptyChannel { channel, line } => {
                write!(f, "'{channel}' on line '{line}' is empty")
            }
            Self::LockFailure {
                symbol,
                mode,
                reason,
            } => write!(f, "cannot {} lock symbol {symbol}: {reason}", mode.as_str()),
            Self::ChannelProtected { channel } => {
                write!(f, "channel '{channel}' is protected from modification")
            }
            Self::CapacityExceeded { kind, limit } => {
                write!(f, "database cannot hold more than {limit} {kind}s")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GdbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GdbError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<LockError> for GdbError {
    fn from(value: LockError) -> Self {
        Self::LockFailure {
            symbol: value.symbol,
            mode: value.mode,
            reason: value.to_string(),
        }
    }
}

impl From<InvalidFiducial> for GdbError {
    fn from(value: InvalidFiducial) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl GdbError {
    pub(crate) fn not_found(kind: SymbolKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Stable machine-readable code, used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidName { .. } => "invalid_name",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::EmptyChannel { .. } => "empty_channel",
            Self::LockFailure { .. } => "lock_failure",
            Self::ChannelProtected { .. } => "channel_protected",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GdbError;
    use crate::model::symbol::SymbolKind;

    #[test]
    fn messages_name_the_entity() {
        let err = GdbError::EmptyChannel {
            channel: "X".to_string(),
            line: "L100".to_string(),
        };
        assert_eq!(err.to_string(), "'X' on line 'L100' is empty");

        let err = GdbError::not_found(SymbolKind::Channel, "mag");
        assert_eq!(err.to_string(), "channel 'mag' not found");
        assert_eq!(err.code(), "not_found");
    }
}
