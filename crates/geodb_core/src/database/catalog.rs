//! Catalog operations: resolution, listing, metadata, creation, deletion,
//! selection and coordinate channel designation.
//!
//! # Invariants
//! - Lookups never create entities; only `resolve_line(.., true)`,
//!   `new_line` and `new_channel` do.
//! - Line creation is strict, channel creation is idempotent for the same
//!   array width.
//! - Deletion drops every lock of this handle before write-locking the
//!   victim.

use super::Database;
use crate::error::{GdbError, GdbResult};
use crate::lock::LockMode;
use crate::model::channel::{
    parse_column_name, validate_channel_name, ChannelDetails, ChannelFilter, ChannelPatch,
    ChannelRecord, NewChannel,
};
use crate::model::element::ElementType;
use crate::model::fiducial::Fiducial;
use crate::model::line::{
    parse_line_name, validate_line_name, LineCategory, LineDetails, LinePatch, LineRecord,
    LineType,
};
use crate::model::symbol::{EntityRef, Symbol, SymbolKind};
use crate::store::CatalogStore;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static TYPE_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([LBTSRPD])(?:(\d+)(?::(\d+))?)?$").expect("line type selector pattern is valid")
});

static FLIGHT_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^F(\d+)(?::(\d+))?$").expect("flight selector pattern is valid")
});

/// How deletion treats names that do not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Unknown names fail with `NotFound`.
    #[default]
    Strict,
    /// Unknown names are skipped. Unknown symbols still fail.
    BestEffort,
}

/// Coordinate axes that may designate a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateAxis {
    X,
    Y,
    Z,
}

impl CoordinateAxis {
    pub const ALL: [CoordinateAxis; 3] = [Self::X, Self::Y, Self::Z];

    /// Channel designated when nothing else was configured.
    pub fn default_channel(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }

    fn property_key(self) -> &'static str {
        match self {
            Self::X => "xyz.x",
            Self::Y => "xyz.y",
            Self::Z => "xyz.z",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LineSelector {
    All,
    ByType {
        line_type: LineType,
        range: Option<(u32, u32)>,
    },
    ByFlight {
        range: (u32, u32),
    },
    Exact(Symbol),
}

impl LineSelector {
    fn matches(&self, symbol: Symbol, line: &LineRecord) -> bool {
        match self {
            Self::All => true,
            Self::ByType { line_type, range } => {
                parse_line_name(&line.name).is_some()
                    && line.line_type == *line_type
                    && range.map_or(true, |(low, high)| (low..=high).contains(&line.number))
            }
            Self::ByFlight { range: (low, high) } => (*low..=*high).contains(&line.flight),
            Self::Exact(wanted) => *wanted == symbol,
        }
    }
}

fn ordered_range(low: u32, high: Option<u32>) -> (u32, u32) {
    let high = high.unwrap_or(low);
    (low.min(high), low.max(high))
}

fn parse_number(value: Option<regex::Match<'_>>) -> Option<u32> {
    value.and_then(|text| text.as_str().parse::<u32>().ok())
}

impl<S: CatalogStore> Database<S> {
    /// Resolves a line, creating a `Normal` line when `create` is set.
    pub fn resolve_line(
        &self,
        line: impl Into<EntityRef>,
        create: bool,
    ) -> GdbResult<(String, Symbol)> {
        let line = line.into();
        if let Some(found) = self.lookup(SymbolKind::Line, &line)? {
            return Ok(found);
        }
        match line {
            EntityRef::Name(name) if create => {
                let symbol = self.new_line(&name, LineCategory::Normal, "")?;
                Ok((name, symbol))
            }
            other => Err(GdbError::not_found(SymbolKind::Line, other.describe())),
        }
    }

    /// Resolves a channel. `base[i]` names resolve to the base channel.
    pub fn resolve_channel(&self, channel: impl Into<EntityRef>) -> GdbResult<(String, Symbol)> {
        let channel = channel.into();
        if let Some(found) = self.lookup(SymbolKind::Channel, &channel)? {
            return Ok(found);
        }
        if let EntityRef::Name(name) = &channel {
            if let Some((base, index)) = parse_column_name(name) {
                let found = self.lookup(SymbolKind::Channel, &EntityRef::from(base))?;
                if let Some((base_name, symbol)) = found {
                    if index < self.channel_record(symbol)?.array_width {
                        return Ok((format!("{base_name}[{index}]"), symbol));
                    }
                }
            }
        }
        Err(GdbError::not_found(SymbolKind::Channel, channel.describe()))
    }

    /// Lines by name, all or only the selected ones.
    pub fn lines(&self, selected_only: bool) -> GdbResult<BTreeMap<String, Symbol>> {
        Ok(self
            .store()
            .lines(selected_only)?
            .into_iter()
            .map(|(symbol, line)| (line.name, symbol))
            .collect())
    }

    /// Channels by name, filtered by array width.
    pub fn channels(&self, filter: ChannelFilter) -> GdbResult<BTreeMap<String, Symbol>> {
        if filter == ChannelFilter::Displayed {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .store()
            .channels()?
            .into_iter()
            .filter(|(_, channel)| match filter {
                ChannelFilter::All => true,
                ChannelFilter::Normal => !channel.is_array(),
                ChannelFilter::Array => channel.is_array(),
                ChannelFilter::Displayed => false,
            })
            .map(|(symbol, channel)| (channel.name, symbol))
            .collect())
    }

    pub fn line_details(&self, line: impl Into<EntityRef>) -> GdbResult<LineDetails> {
        let (_, symbol) = self.resolve_line(line, false)?;
        let _guard = self.lock(symbol, LockMode::Read)?;
        Ok(LineDetails {
            symbol,
            record: self.line_record(symbol)?,
        })
    }

    pub fn chan_details(&self, channel: impl Into<EntityRef>) -> GdbResult<ChannelDetails> {
        let (_, symbol) = self.resolve_channel(channel)?;
        let _guard = self.lock(symbol, LockMode::Read)?;
        Ok(ChannelDetails {
            symbol,
            record: self.channel_record(symbol)?,
        })
    }

    /// Applies the fields present in `patch` to a channel.
    ///
    /// A protected channel only accepts patches that also clear protection.
    pub fn chan_set_details(
        &self,
        channel: impl Into<EntityRef>,
        patch: &ChannelPatch,
    ) -> GdbResult<()> {
        let (name, symbol) = self.resolve_channel(channel)?;
        let _guard = self.lock(symbol, LockMode::Write)?;
        let mut record = self.channel_record(symbol)?;
        if record.protect && !patch.clears_protection() {
            return Err(GdbError::ChannelProtected { channel: name });
        }
        record.apply(patch);
        self.store().update_channel(symbol, &record)?;
        debug!(
            "event=chan_set_details module=catalog status=ok symbol={} protect={}",
            symbol.raw(),
            record.protect
        );
        Ok(())
    }

    /// Applies the fields present in `patch` to a line.
    ///
    /// Setting a group class makes the line a group line; clearing it turns
    /// a group line back into a flight line when its name follows the flight
    /// grammar, or a normal line otherwise.
    pub fn line_set_details(&self, line: impl Into<EntityRef>, patch: &LinePatch) -> GdbResult<()> {
        let (_, symbol) = self.resolve_line(line, false)?;
        let _guard = self.lock(symbol, LockMode::Write)?;
        let mut record = self.line_record(symbol)?;
        record.apply(patch);
        if record.group_class.is_some() {
            record.category = LineCategory::Group;
        } else if record.category == LineCategory::Group {
            record.category = if parse_line_name(&record.name).is_some() {
                LineCategory::Flight
            } else {
                LineCategory::Normal
            };
        }
        self.store().update_line(symbol, &record)?;
        debug!(
            "event=line_set_details module=catalog status=ok symbol={}",
            symbol.raw()
        );
        Ok(())
    }

    /// Array width of a channel, `1` for scalar channels.
    pub fn chan_array(&self, channel: impl Into<EntityRef>) -> GdbResult<u32> {
        let (_, symbol) = self.resolve_channel(channel)?;
        Ok(self.channel_record(symbol)?.array_width)
    }

    pub fn chan_element_type(&self, channel: impl Into<EntityRef>) -> GdbResult<ElementType> {
        let (_, symbol) = self.resolve_channel(channel)?;
        Ok(self.channel_record(symbol)?.element_type)
    }

    /// Native fiducial of the data stored for (line, channel).
    ///
    /// `None` when nothing was written for the pair.
    pub fn chan_fid(
        &self,
        line: impl Into<EntityRef>,
        channel: impl Into<EntityRef>,
    ) -> GdbResult<Option<Fiducial>> {
        let (_, line_symbol) = self.resolve_line(line, false)?;
        let (_, channel_symbol) = self.resolve_channel(channel)?;
        let _guard = self.lock(channel_symbol, LockMode::Read)?;
        Ok(self
            .store()
            .vector(line_symbol, channel_symbol)?
            .and_then(|vector| vector.fiducial))
    }

    /// Returns the channel symbol, creating the channel when missing.
    ///
    /// An existing channel is reused when its array width matches, and the
    /// requested details are applied to it.
    pub fn new_channel(&self, name: &str, request: &NewChannel) -> GdbResult<Symbol> {
        if request.array_width == 0 {
            return Err(GdbError::invalid_argument(format!(
                "channel '{name}' needs an array width of at least 1"
            )));
        }

        if let Some(symbol) = self.store().find_symbol(SymbolKind::Channel, name)? {
            let existing = self.channel_record(symbol)?;
            if existing.array_width != request.array_width {
                return Err(GdbError::AlreadyExists {
                    kind: SymbolKind::Channel,
                    name: existing.name,
                });
            }
            if !request.details.is_empty() {
                self.chan_set_details(symbol, &request.details)?;
            }
            return Ok(symbol);
        }

        validate_channel_name(name).map_err(|reason| GdbError::InvalidName {
            kind: SymbolKind::Channel,
            name: name.to_string(),
            reason,
        })?;
        self.ensure_capacity(SymbolKind::Channel)?;

        let mut record = ChannelRecord::new(name, request.element_type, request.array_width);
        record.apply(&request.details);
        let symbol = self.store().insert_channel(&record)?;
        info!(
            "event=channel_create module=catalog status=ok symbol={} element_type={} array_width={}",
            symbol.raw(),
            record.element_type.as_str(),
            record.array_width
        );
        Ok(symbol)
    }

    /// Creates a line; fails when the name is taken.
    ///
    /// A non-empty `group` makes the line a `Group` line of that class.
    pub fn new_line(&self, name: &str, category: LineCategory, group: &str) -> GdbResult<Symbol> {
        let category = if group.is_empty() {
            category
        } else {
            LineCategory::Group
        };
        validate_line_name(name, category).map_err(|reason| GdbError::InvalidName {
            kind: SymbolKind::Line,
            name: name.to_string(),
            reason,
        })?;
        if let Some(symbol) = self.store().find_symbol(SymbolKind::Line, name)? {
            let existing = self
                .store()
                .symbol_name(SymbolKind::Line, symbol)?
                .unwrap_or_else(|| name.to_string());
            return Err(GdbError::AlreadyExists {
                kind: SymbolKind::Line,
                name: existing,
            });
        }
        self.ensure_capacity(SymbolKind::Line)?;

        let mut record = LineRecord::new(name, category);
        if !group.is_empty() {
            record.group_class = Some(group.to_string());
        }
        let symbol = self.store().insert_line(&record)?;
        info!(
            "event=line_create module=catalog status=ok symbol={} category={}",
            symbol.raw(),
            category.as_str()
        );
        Ok(symbol)
    }

    /// Deletes channels and their data on every line.
    ///
    /// Returns how many channels were deleted.
    pub fn delete_channels<I>(&self, channels: I, mode: DeleteMode) -> GdbResult<usize>
    where
        I: IntoIterator,
        I::Item: Into<EntityRef>,
    {
        let mut deleted = 0;
        for channel in channels {
            if self.delete_entity(SymbolKind::Channel, channel.into(), mode)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Deletes a line and all of its channel data.
    pub fn delete_line(&self, line: impl Into<EntityRef>, mode: DeleteMode) -> GdbResult<bool> {
        self.delete_entity(SymbolKind::Line, line.into(), mode)
    }

    fn delete_entity(
        &self,
        kind: SymbolKind,
        entity: EntityRef,
        mode: DeleteMode,
    ) -> GdbResult<bool> {
        let symbol = match self.lookup(kind, &entity)? {
            Some((_, symbol)) => symbol,
            None => match (&entity, mode) {
                (EntityRef::Name(name), DeleteMode::BestEffort) => {
                    debug!(
                        "event=symbol_delete module=catalog status=skipped kind={} name_len={}",
                        kind.as_str(),
                        name.len()
                    );
                    return Ok(false);
                }
                _ => return Err(GdbError::not_found(kind, entity.describe())),
            },
        };

        self.release_all_locks();
        let _guard = self.lock(symbol, LockMode::Write)?;
        let deleted = self.store().delete_symbol(kind, symbol)?;
        info!(
            "event=symbol_delete module=catalog status=ok kind={} symbol={}",
            kind.as_str(),
            symbol.raw()
        );
        Ok(deleted)
    }

    /// Includes or excludes lines by comma-separated selectors.
    ///
    /// Selectors apply left to right:
    /// - empty: every line;
    /// - `L`, `L100`, `L100:200`: lines of a type letter (`L B T S R P D`),
    ///   optionally within a line number range;
    /// - `F10`, `F10:12`: lines of a flight or flight range;
    /// - anything else: one line by exact name.
    pub fn select_lines(&self, selection: &str, include: bool) -> GdbResult<usize> {
        let selectors = selection
            .split(',')
            .map(|selector| self.parse_selector(selector.trim()))
            .collect::<GdbResult<Vec<_>>>()?;

        let mut changed = 0;
        for selector in &selectors {
            for (symbol, mut line) in self.store().lines(false)? {
                if !selector.matches(symbol, &line) || line.selected == include {
                    continue;
                }
                let _guard = self.lock(symbol, LockMode::Write)?;
                line.selected = include;
                self.store().update_line(symbol, &line)?;
                changed += 1;
            }
        }
        debug!(
            "event=select_lines module=catalog status=ok selectors={} include={} changed={}",
            selectors.len(),
            include,
            changed
        );
        Ok(changed)
    }

    fn parse_selector(&self, selector: &str) -> GdbResult<LineSelector> {
        if selector.is_empty() {
            return Ok(LineSelector::All);
        }
        if let Some(captures) = TYPE_SELECTOR.captures(selector) {
            let letter = captures
                .get(1)
                .and_then(|value| value.as_str().chars().next());
            if let Some(line_type) = letter.and_then(LineType::from_letter) {
                let range = parse_number(captures.get(2))
                    .map(|low| ordered_range(low, parse_number(captures.get(3))));
                return Ok(LineSelector::ByType { line_type, range });
            }
        }
        if let Some(captures) = FLIGHT_SELECTOR.captures(selector) {
            if let Some(low) = parse_number(captures.get(1)) {
                return Ok(LineSelector::ByFlight {
                    range: ordered_range(low, parse_number(captures.get(2))),
                });
            }
        }
        match self.store().find_symbol(SymbolKind::Line, selector)? {
            Some(symbol) => Ok(LineSelector::Exact(symbol)),
            None => Err(GdbError::invalid_argument(format!(
                "line selector '{selector}' matches no line"
            ))),
        }
    }

    /// Designates the channel used for a coordinate axis.
    pub fn set_xyz_channel(
        &self,
        axis: CoordinateAxis,
        channel: impl Into<EntityRef>,
    ) -> GdbResult<()> {
        let channel = channel.into();
        let (name, _) = self
            .lookup(SymbolKind::Channel, &channel)?
            .ok_or_else(|| GdbError::not_found(SymbolKind::Channel, channel.describe()))?;
        self.store().set_property(axis.property_key(), &name)?;
        Ok(())
    }

    /// Channel designated for `axis`, `None` when that channel does not exist.
    pub fn xyz_channel(&self, axis: CoordinateAxis) -> GdbResult<Option<String>> {
        let designated = self
            .store()
            .property(axis.property_key())?
            .unwrap_or_else(|| axis.default_channel().to_string());
        Ok(self
            .lookup(SymbolKind::Channel, &EntityRef::Name(designated))?
            .map(|(name, _)| name))
    }

    fn ensure_capacity(&self, kind: SymbolKind) -> GdbResult<()> {
        let limit = match kind {
            SymbolKind::Line => self.options().max_lines,
            SymbolKind::Channel => self.options().max_channels,
        };
        if self.store().count(kind)? >= limit {
            return Err(GdbError::CapacityExceeded { kind, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ordered_range, DeleteMode, LineSelector};
    use crate::database::Database;
    use crate::lock::LockMode;
    use crate::model::channel::NewChannel;
    use crate::model::element::ElementType;
    use crate::model::line::{LineCategory, LineRecord, LineType};
    use crate::model::symbol::Symbol;

    #[test]
    fn deleting_drops_every_lock_of_the_handle() {
        let db = Database::in_memory().unwrap();
        let kept = db.new_line("L10", LineCategory::Flight, "").unwrap();
        db.new_line("L20", LineCategory::Flight, "").unwrap();
        let channel = db
            .new_channel("MAG", &NewChannel::of(ElementType::Double))
            .unwrap();
        db.new_channel("GONE", &NewChannel::of(ElementType::Double))
            .unwrap();

        let line_guard = db.lock(kept, LockMode::Read).unwrap();
        assert!(db.delete_line("L20", DeleteMode::Strict).unwrap());
        assert_eq!(db.lock_manager().mode_of(kept), None);

        let channel_guard = db.lock(channel, LockMode::Write).unwrap();
        assert_eq!(db.delete_channels(["GONE"], DeleteMode::Strict).unwrap(), 1);
        assert_eq!(db.lock_manager().mode_of(channel), None);
        assert_eq!(db.lock_manager().locked_count(), 0);

        drop(channel_guard);
        drop(line_guard);
        assert_eq!(db.lock_manager().locked_count(), 0);
    }

    #[test]
    fn ranges_are_ordered_and_default_to_one_number() {
        assert_eq!(ordered_range(800, Some(99)), (99, 800));
        assert_eq!(ordered_range(7, None), (7, 7));
    }

    #[test]
    fn type_selectors_only_match_parsed_line_names() {
        let selector = LineSelector::ByType {
            line_type: LineType::Tie,
            range: Some((10, 20)),
        };
        let tie = LineRecord::new("T15", LineCategory::Flight);
        let other_tie = LineRecord::new("T25", LineCategory::Flight);
        let plain = LineRecord::new("survey_a", LineCategory::Normal);

        assert!(selector.matches(Symbol::new(1), &tie));
        assert!(!selector.matches(Symbol::new(2), &other_tie));
        assert!(!selector.matches(Symbol::new(3), &plain));
    }
}
