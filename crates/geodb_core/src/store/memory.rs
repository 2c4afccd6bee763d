//! In-memory catalog store.
//!
//! # Responsibility
//! - Provide a storage backend with no persistence, for tests and scratch
//!   databases.
//! - Emulate commit/discard with snapshots of the catalog state.
//!
//! # Invariants
//! - Cloning a `MemoryStore` yields another handle on the same state.
//! - The symbol counter lives outside the snapshots, so `discard` never makes
//!   a symbol value available again.

use super::{CatalogStore, StoreError, StoreResult};
use crate::model::channel::ChannelRecord;
use crate::model::line::LineRecord;
use crate::model::symbol::{name_key, Symbol, SymbolKind};
use crate::model::vector::ChannelVector;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct Catalog {
    names: HashMap<(SymbolKind, String), Symbol>,
    lines: BTreeMap<Symbol, LineRecord>,
    channels: BTreeMap<Symbol, ChannelRecord>,
    data: HashMap<(Symbol, Symbol), ChannelVector>,
    properties: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    live: Catalog,
    committed: Catalog,
    last_symbol: u64,
}

impl MemoryState {
    fn allocate(&mut self, kind: SymbolKind, name: &str) -> StoreResult<Symbol> {
        let key = (kind, name_key(name));
        if self.live.names.contains_key(&key) {
            return Err(StoreError::InvalidData(format!(
                "{kind} name `{name}` is already taken"
            )));
        }
        self.last_symbol += 1;
        let symbol = Symbol::new(self.last_symbol);
        self.live.names.insert(key, symbol);
        Ok(symbol)
    }
}

/// Shared in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl CatalogStore for MemoryStore {
    fn find_symbol(&self, kind: SymbolKind, name: &str) -> StoreResult<Option<Symbol>> {
        let state = self.state()?;
        Ok(state.live.names.get(&(kind, name_key(name))).copied())
    }

    fn symbol_name(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<Option<String>> {
        let state = self.state()?;
        Ok(match kind {
            SymbolKind::Line => state.live.lines.get(&symbol).map(|line| line.name.clone()),
            SymbolKind::Channel => state
                .live
                .channels
                .get(&symbol)
                .map(|channel| channel.name.clone()),
        })
    }

    fn count(&self, kind: SymbolKind) -> StoreResult<usize> {
        let state = self.state()?;
        Ok(match kind {
            SymbolKind::Line => state.live.lines.len(),
            SymbolKind::Channel => state.live.channels.len(),
        })
    }

    fn insert_line(&self, record: &LineRecord) -> StoreResult<Symbol> {
        let mut state = self.state()?;
        let symbol = state.allocate(SymbolKind::Line, &record.name)?;
        state.live.lines.insert(symbol, record.clone());
        Ok(symbol)
    }

    fn line(&self, symbol: Symbol) -> StoreResult<Option<LineRecord>> {
        Ok(self.state()?.live.lines.get(&symbol).cloned())
    }

    fn update_line(&self, symbol: Symbol, record: &LineRecord) -> StoreResult<()> {
        let mut state = self.state()?;
        match state.live.lines.get_mut(&symbol) {
            Some(line) => {
                *line = record.clone();
                Ok(())
            }
            None => Err(StoreError::InvalidData(format!("unknown line {symbol}"))),
        }
    }

    fn lines(&self, selected_only: bool) -> StoreResult<Vec<(Symbol, LineRecord)>> {
        let state = self.state()?;
        Ok(state
            .live
            .lines
            .iter()
            .filter(|(_, line)| !selected_only || line.selected)
            .map(|(symbol, line)| (*symbol, line.clone()))
            .collect())
    }

    fn insert_channel(&self, record: &ChannelRecord) -> StoreResult<Symbol> {
        let mut state = self.state()?;
        let symbol = state.allocate(SymbolKind::Channel, &record.name)?;
        state.live.channels.insert(symbol, record.clone());
        Ok(symbol)
    }

    fn channel(&self, symbol: Symbol) -> StoreResult<Option<ChannelRecord>> {
        Ok(self.state()?.live.channels.get(&symbol).cloned())
    }

    fn update_channel(&self, symbol: Symbol, record: &ChannelRecord) -> StoreResult<()> {
        let mut state = self.state()?;
        match state.live.channels.get_mut(&symbol) {
            Some(channel) => {
                *channel = record.clone();
                Ok(())
            }
            None => Err(StoreError::InvalidData(format!("unknown channel {symbol}"))),
        }
    }

    fn channels(&self) -> StoreResult<Vec<(Symbol, ChannelRecord)>> {
        let state = self.state()?;
        Ok(state
            .live
            .channels
            .iter()
            .map(|(symbol, channel)| (*symbol, channel.clone()))
            .collect())
    }

    fn delete_symbol(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<bool> {
        let mut state = self.state()?;
        let catalog = &mut state.live;
        let name = match kind {
            SymbolKind::Line => catalog.lines.remove(&symbol).map(|line| line.name),
            SymbolKind::Channel => catalog.channels.remove(&symbol).map(|channel| channel.name),
        };
        let Some(name) = name else {
            return Ok(false);
        };

        catalog.names.remove(&(kind, name_key(&name)));
        catalog.data.retain(|(line, channel), _| match kind {
            SymbolKind::Line => *line != symbol,
            SymbolKind::Channel => *channel != symbol,
        });
        Ok(true)
    }

    fn vector(&self, line: Symbol, channel: Symbol) -> StoreResult<Option<ChannelVector>> {
        Ok(self.state()?.live.data.get(&(line, channel)).cloned())
    }

    fn put_vector(
        &self,
        line: Symbol,
        channel: Symbol,
        vector: &ChannelVector,
    ) -> StoreResult<()> {
        let mut state = self.state()?;
        if !state.live.lines.contains_key(&line) {
            return Err(StoreError::InvalidData(format!("unknown line {line}")));
        }
        if !state.live.channels.contains_key(&channel) {
            return Err(StoreError::InvalidData(format!("unknown channel {channel}")));
        }
        state.live.data.insert((line, channel), vector.clone());
        Ok(())
    }

    fn property(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.state()?.live.properties.get(key).cloned())
    }

    fn set_property(&self, key: &str, value: &str) -> StoreResult<()> {
        self.state()?
            .live
            .properties
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        state.committed = state.live.clone();
        Ok(())
    }

    fn discard(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        state.live = state.committed.clone();
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        None
    }
}
