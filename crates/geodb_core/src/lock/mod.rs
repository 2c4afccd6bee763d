//! Per-symbol read/write locks.
//!
//! # Responsibility
//! - Grant shared (read) or exclusive (write) access to one catalog symbol.
//! - Release through RAII guards so every exit path, including `?` error
//!   returns, unlocks before the error reaches the caller.
//!
//! # Invariants
//! - A symbol is either unlocked, read-locked by any number of holders, or
//!   write-locked by exactly one holder.
//! - Locks are re-entrant per holder; a write holder may also read.
//! - A holder never escalates: asking for write while holding only read on
//!   the same symbol fails at once.
//! - Releasing a lock that is not held is a no-op.
//! - Acquisition waits forever unless `LockWait::Timeout` is configured.

use crate::model::symbol::Symbol;
use log::{debug, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Requested access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// How long an acquisition may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    #[default]
    Infinite,
    Timeout(Duration),
}

/// Identity of one lock owner; every open database handle is one holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderId(u64);

impl Display for HolderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an acquisition failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockErrorKind {
    /// Another thread panicked while holding the lock table.
    Poisoned,
    /// `LockWait::Timeout` elapsed.
    TimedOut(Duration),
    /// Write requested by a holder that only reads the symbol.
    Escalation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockError {
    pub symbol: Symbol,
    pub mode: LockMode,
    pub kind: LockErrorKind,
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LockErrorKind::Poisoned => write!(
                f,
                "{} lock on {} failed: lock table poisoned",
                self.mode.as_str(),
                self.symbol
            ),
            LockErrorKind::TimedOut(waited) => write!(
                f,
                "{} lock on {} timed out after {} ms",
                self.mode.as_str(),
                self.symbol,
                waited.as_millis()
            ),
            LockErrorKind::Escalation => write!(
                f,
                "write lock on {} refused: holder already reads it",
                self.symbol
            ),
        }
    }
}

impl Error for LockError {}

#[derive(Debug, Default)]
struct SymbolLock {
    readers: HashMap<HolderId, usize>,
    writer: Option<(HolderId, usize)>,
}

impl SymbolLock {
    fn grantable(&self, holder: HolderId, mode: LockMode) -> bool {
        let writer_ok = self.writer.map_or(true, |(owner, _)| owner == holder);
        match mode {
            LockMode::Read => writer_ok,
            LockMode::Write => writer_ok && self.readers.keys().all(|reader| *reader == holder),
        }
    }

    fn escalates(&self, holder: HolderId, mode: LockMode) -> bool {
        mode == LockMode::Write
            && self.readers.contains_key(&holder)
            && self.writer.map_or(true, |(owner, _)| owner != holder)
    }

    fn grant(&mut self, holder: HolderId, mode: LockMode) {
        match mode {
            LockMode::Read => *self.readers.entry(holder).or_insert(0) += 1,
            LockMode::Write => match &mut self.writer {
                Some((_, depth)) => *depth += 1,
                None => self.writer = Some((holder, 1)),
            },
        }
    }

    /// Returns whether anything was released.
    fn release(&mut self, holder: HolderId, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => match self.readers.get_mut(&holder) {
                Some(depth) if *depth > 1 => {
                    *depth -= 1;
                    true
                }
                Some(_) => {
                    self.readers.remove(&holder);
                    true
                }
                None => false,
            },
            LockMode::Write => match &mut self.writer {
                Some((owner, depth)) if *owner == holder => {
                    if *depth > 1 {
                        *depth -= 1;
                    } else {
                        self.writer = None;
                    }
                    true
                }
                _ => false,
            },
        }
    }

    fn release_holder(&mut self, holder: HolderId) -> bool {
        let had_read = self.readers.remove(&holder).is_some();
        let had_write = matches!(self.writer, Some((owner, _)) if owner == holder);
        if had_write {
            self.writer = None;
        }
        had_read || had_write
    }

    fn is_unlocked(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }

    fn mode(&self) -> Option<LockMode> {
        if self.writer.is_some() {
            Some(LockMode::Write)
        } else if !self.readers.is_empty() {
            Some(LockMode::Read)
        } else {
            None
        }
    }
}

/// Lock table shared by every handle opened on one store.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<Symbol, SymbolLock>>,
    released: Condvar,
    next_holder: AtomicU64,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new lock holder identity.
    pub fn register_holder(&self) -> HolderId {
        HolderId(self.next_holder.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Blocks until `mode` is granted on `symbol` for `holder`.
    pub fn acquire(
        &self,
        holder: HolderId,
        symbol: Symbol,
        mode: LockMode,
        wait: LockWait,
    ) -> Result<SymbolLockGuard<'_>, LockError> {
        let fail = |kind| LockError { symbol, mode, kind };
        let started_at = Instant::now();
        let mut table = self.table.lock().map_err(|_| fail(LockErrorKind::Poisoned))?;
        let mut waited = false;

        if table.get(&symbol).is_some_and(|entry| entry.escalates(holder, mode)) {
            warn!(
                "event=lock_acquire module=lock status=error symbol={} holder={} error_code=lock_escalation",
                symbol.raw(),
                holder
            );
            return Err(fail(LockErrorKind::Escalation));
        }

        loop {
            let entry = table.entry(symbol).or_default();
            if entry.grantable(holder, mode) {
                entry.grant(holder, mode);
                if waited {
                    debug!(
                        "event=lock_acquire module=lock status=ok symbol={} mode={} holder={} waited_ms={}",
                        symbol.raw(),
                        mode.as_str(),
                        holder,
                        started_at.elapsed().as_millis()
                    );
                }
                return Ok(SymbolLockGuard {
                    manager: self,
                    holder,
                    symbol,
                    mode,
                });
            }

            if !waited {
                debug!(
                    "event=lock_acquire module=lock status=waiting symbol={} mode={} holder={}",
                    symbol.raw(),
                    mode.as_str(),
                    holder
                );
                waited = true;
            }

            table = match wait {
                LockWait::Infinite => self
                    .released
                    .wait(table)
                    .map_err(|_| fail(LockErrorKind::Poisoned))?,
                LockWait::Timeout(limit) => {
                    let elapsed = started_at.elapsed();
                    if elapsed >= limit {
                        warn!(
                            "event=lock_acquire module=lock status=error symbol={} mode={} holder={} error_code=lock_timeout",
                            symbol.raw(),
                            mode.as_str(),
                            holder
                        );
                        return Err(fail(LockErrorKind::TimedOut(elapsed)));
                    }
                    self.released
                        .wait_timeout(table, limit - elapsed)
                        .map_err(|_| fail(LockErrorKind::Poisoned))?
                        .0
                }
            };
        }
    }

    /// Releases one level of `mode` on `symbol`; no-op when not held.
    pub fn release(&self, holder: HolderId, symbol: Symbol, mode: LockMode) {
        let mut table = self.table_for_release();
        let released = match table.get_mut(&symbol) {
            Some(entry) => {
                let released = entry.release(holder, mode);
                if entry.is_unlocked() {
                    table.remove(&symbol);
                }
                released
            }
            None => false,
        };
        drop(table);
        if released {
            self.released.notify_all();
        }
    }

    /// Releases every lock owned by `holder`.
    pub fn release_all(&self, holder: HolderId) {
        let mut table = self.table_for_release();
        let mut released = false;
        table.retain(|_, entry| {
            released |= entry.release_holder(holder);
            !entry.is_unlocked()
        });
        drop(table);
        if released {
            debug!("event=lock_release_all module=lock status=ok holder={holder}");
            self.released.notify_all();
        }
    }

    /// Current lock state of `symbol`, `None` when unlocked.
    pub fn mode_of(&self, symbol: Symbol) -> Option<LockMode> {
        self.table_for_release()
            .get(&symbol)
            .and_then(SymbolLock::mode)
    }

    /// Number of symbols currently locked by anyone.
    pub fn locked_count(&self) -> usize {
        self.table_for_release().len()
    }

    // Release paths must always make progress, so they look through poison.
    fn table_for_release(&self) -> MutexGuard<'_, HashMap<Symbol, SymbolLock>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped lock; released on drop.
#[derive(Debug)]
pub struct SymbolLockGuard<'a> {
    manager: &'a LockManager,
    holder: HolderId,
    symbol: Symbol,
    mode: LockMode,
}

impl SymbolLockGuard<'_> {
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for SymbolLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.holder, self.symbol, self.mode);
    }
}
