//! Unique value enumeration across lines.
//!
//! # Invariants
//! - Values are the channel's samples rendered with its display settings;
//!   dummies are never values.
//! - The result never holds more than `max` values, unless the observer
//!   stops the scan, in which case the set gathered so far is returned as is.
//! - A line that cannot be read, or holds no rows, is skipped and does not
//!   count as a stalled line.

use super::read::ReadOptions;
use super::Database;
use crate::error::GdbResult;
use crate::model::element::Element;
use crate::model::symbol::{name_key, EntityRef};
use crate::store::CatalogStore;
use log::{debug, info};
use std::collections::BTreeSet;

/// Limits for [`Database::list_values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueScan {
    /// Maximum number of values returned.
    pub max: usize,
    /// Scan selected lines only.
    pub selected_only: bool,
    /// Stop once more than this many lines in a row add no new value;
    /// `0` scans every line.
    pub max_stalled_lines: usize,
}

impl Default for ValueScan {
    fn default() -> Self {
        Self {
            max: 1000,
            selected_only: true,
            max_stalled_lines: 50,
        }
    }
}

/// Progress sink and cancellation source for a value scan.
pub trait ScanObserver {
    /// Called after each scanned line with a percentage of lines done.
    fn progress(&mut self, _message: &str, _percent: f64) {}

    /// Checked after each scanned line; `true` ends the scan.
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Observer that ignores progress and never stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

impl<S: CatalogStore> Database<S> {
    /// Lists the distinct values of `channel` over the lines of `scan`.
    ///
    /// Lines are visited in case-insensitive name order.
    pub fn list_values(
        &self,
        channel: impl Into<EntityRef>,
        scan: &ValueScan,
        observer: &mut dyn ScanObserver,
    ) -> GdbResult<Vec<String>> {
        let channel = channel.into();
        let (channel_name, _) = self.resolve_channel(&channel)?;

        let mut lines = self
            .lines(scan.selected_only)?
            .into_iter()
            .collect::<Vec<_>>();
        lines.sort_by_key(|(name, _)| name_key(name));
        let total = lines.len();

        let options = ReadOptions::channels([channel]);
        let mut values = BTreeSet::new();
        let mut previous_len = None;
        let mut stalled = 0;
        let mut scanned = 0;

        for (line_name, line_symbol) in &lines {
            let line = match self.read_line::<String>(*line_symbol, &options) {
                Ok(line) => line,
                Err(err) => {
                    debug!(
                        "event=list_values module=scan status=skipped line={} error_code={}",
                        line_symbol.raw(),
                        err.code()
                    );
                    continue;
                }
            };
            if line.rows() == 0 {
                continue;
            }

            values.extend(line.data.into_iter().filter(|value| !value.is_dummy()));
            if values.len() > scan.max {
                break;
            }
            if scan.max_stalled_lines > 0 {
                if previous_len == Some(values.len()) {
                    stalled += 1;
                    if stalled > scan.max_stalled_lines {
                        break;
                    }
                } else {
                    stalled = 0;
                }
            }
            previous_len = Some(values.len());

            scanned += 1;
            observer.progress(
                &format!("Scanning unique values in \"{channel_name}\", {line_name}"),
                scanned as f64 * 100.0 / total as f64,
            );
            if observer.should_stop() {
                info!(
                    "event=list_values module=scan status=stopped lines_scanned={} values={}",
                    scanned,
                    values.len()
                );
                return Ok(values.into_iter().collect());
            }
        }

        info!(
            "event=list_values module=scan status=ok lines_scanned={} values={}",
            scanned,
            values.len().min(scan.max)
        );
        Ok(values.into_iter().take(scan.max).collect())
    }
}
