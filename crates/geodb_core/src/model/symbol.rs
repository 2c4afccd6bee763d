//! Catalog symbol identity.
//!
//! # Invariants
//! - Symbols are allocated monotonically by the storage backend and never
//!   reused within one database, so a symbol cannot be reassigned while a
//!   lock on it is outstanding.
//! - Names are unique per `SymbolKind` under case-insensitive comparison.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque stable identifier for a line or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(u64);

impl Symbol {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity family a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Line,
    Channel,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Channel => "channel",
        }
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-side reference to a catalog entity: either a name or a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Name(String),
    Symbol(Symbol),
}

impl EntityRef {
    /// Human-readable form used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Symbol(symbol) => symbol.to_string(),
        }
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<&String> for EntityRef {
    fn from(value: &String) -> Self {
        Self::Name(value.clone())
    }
}

impl From<&EntityRef> for EntityRef {
    fn from(value: &EntityRef) -> Self {
        value.clone()
    }
}

impl From<Symbol> for EntityRef {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

/// Case-folded key used for case-insensitive name uniqueness.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{name_key, EntityRef, Symbol};

    #[test]
    fn entity_ref_converts_from_names_and_symbols() {
        assert_eq!(EntityRef::from("L100"), EntityRef::Name("L100".to_string()));
        assert_eq!(
            EntityRef::from(Symbol::new(7)),
            EntityRef::Symbol(Symbol::new(7))
        );
        assert_eq!(EntityRef::from(Symbol::new(7)).describe(), "#7");
    }

    #[test]
    fn name_key_folds_case() {
        assert_eq!(name_key("Mag_Raw"), name_key("MAG_RAW"));
    }
}
