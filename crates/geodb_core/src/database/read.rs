//! Line read pipeline.
//!
//! # Responsibility
//! - Expand array channels into columns and fetch every column's native
//!   vector for one line.
//! - Reconcile the columns onto one fiducial and assemble a dense
//!   `rows x columns` array.
//! - Drop dummy rows or dummy columns on request.
//!
//! # Invariants
//! - Channel data is read-locked only while its vector is fetched.
//! - The returned column names always follow the array's column order.
//! - The row count is the first column's native length.

use super::catalog::CoordinateAxis;
use super::Database;
use crate::error::{GdbError, GdbResult};
use crate::lock::LockMode;
use crate::model::channel::{column_name, parse_column_name, ChannelFilter};
use crate::model::element::{Element, TextFormat};
use crate::model::fiducial::Fiducial;
use crate::model::symbol::{name_key, EntityRef, Symbol};
use crate::model::vector::{ChannelVector, Vector};
use crate::store::CatalogStore;
use log::debug;
use ndarray::{Array2, Axis};
use std::collections::HashMap;

/// Missing-data handling applied after assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DummyMode {
    /// Return the array as assembled.
    #[default]
    Keep,
    /// Drop rows holding a dummy in any column; the fiducial becomes `(0, 1)`.
    RemoveRows,
    /// Drop columns holding a dummy in any row; fiducial and rows are kept.
    RemoveColumns,
}

impl DummyMode {
    /// Maps the numeric codes `0` (keep), `1` (rows) and `2` (columns).
    pub fn from_code(code: i32) -> GdbResult<Self> {
        match code {
            0 => Ok(Self::Keep),
            1 => Ok(Self::RemoveRows),
            2 => Ok(Self::RemoveColumns),
            other => Err(GdbError::invalid_argument(format!(
                "unrecognized dummy handling mode {other}"
            ))),
        }
    }
}

/// Options for [`Database::read_line`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Channels to read; `None` reads every channel.
    pub channels: Option<Vec<EntityRef>>,
    /// Required output fiducial; derived from the data when `None`.
    pub fiducial: Option<Fiducial>,
    pub dummy: DummyMode,
}

impl ReadOptions {
    pub fn channels<I>(channels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<EntityRef>,
    {
        Self {
            channels: Some(channels.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_fiducial(mut self, fiducial: Fiducial) -> Self {
        self.fiducial = Some(fiducial);
        self
    }

    pub fn with_dummy(mut self, dummy: DummyMode) -> Self {
        self.dummy = dummy;
        self
    }
}

/// Dense line data.
#[derive(Debug, Clone, PartialEq)]
pub struct LineData<T> {
    /// `rows x columns` samples.
    pub data: Array2<T>,
    /// Column names in array order; array channels appear as `base[i]`.
    pub channels: Vec<String>,
    pub fiducial: Fiducial,
}

impl<T> LineData<T> {
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| name_key(channel) == name_key(name))
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    symbol: Symbol,
    index: usize,
    format: TextFormat,
}

impl<S: CatalogStore> Database<S> {
    /// Reads channels of one line into a dense array.
    ///
    /// Unless `options.fiducial` is given, the output grid starts at the
    /// smallest native start and steps by the smallest native increment.
    /// Columns sampled more coarsely than that increment are not
    /// interpolated: positions between their native samples hold dummies.
    ///
    /// # Errors
    /// - `NotFound` for an unknown line or channel.
    /// - `EmptyChannel` when the first column has no data, or no column has
    ///   a fiducial.
    pub fn read_line<T: Element>(
        &self,
        line: impl Into<EntityRef>,
        options: &ReadOptions,
    ) -> GdbResult<LineData<T>> {
        let (line_name, line_symbol) = self.resolve_line(line, false)?;
        let columns = self.read_columns(options.channels.as_deref())?;
        let Some(first) = columns.first() else {
            return Err(GdbError::invalid_argument(format!(
                "line '{line_name}' has no channels to read"
            )));
        };

        let mut fetched: HashMap<Symbol, Option<ChannelVector>> = HashMap::new();
        let mut vectors: Vec<Vector<T>> = Vec::with_capacity(columns.len());
        for column in &columns {
            if !fetched.contains_key(&column.symbol) {
                let _guard = self.lock(column.symbol, LockMode::Read)?;
                let stored = self.store().vector(line_symbol, column.symbol)?;
                fetched.insert(column.symbol, stored);
            }
            let vector = match fetched.get(&column.symbol) {
                Some(Some(stored)) => stored.column::<T>(column.index, &column.format),
                _ => Vector::empty(),
            };
            vectors.push(vector);
        }

        let length = vectors.first().map_or(0, Vector::len);
        let native = vectors
            .iter()
            .filter_map(Vector::fiducial)
            .collect::<Vec<_>>();
        let fiducial = options.fiducial.or_else(|| Fiducial::common(&native));
        let fiducial = match fiducial {
            Some(fiducial) if length > 0 => fiducial,
            _ => {
                return Err(GdbError::EmptyChannel {
                    channel: first.name.clone(),
                    line: line_name,
                })
            }
        };

        let resampled = vectors
            .iter()
            .map(|vector| vector.resample(fiducial, length))
            .collect::<Vec<_>>();
        let data = Array2::from_shape_fn((length, resampled.len()), |(row, column)| {
            resampled[column].values()[row].clone()
        });
        let names = columns.into_iter().map(|column| column.name).collect();

        let assembled = LineData {
            data,
            channels: names,
            fiducial,
        };
        let result = match options.dummy {
            DummyMode::Keep => assembled,
            DummyMode::RemoveRows => remove_dummy_rows(assembled),
            DummyMode::RemoveColumns => remove_dummy_columns(assembled),
        };
        debug!(
            "event=read_line module=read status=ok line={} rows={} columns={} element_type={}",
            line_symbol.raw(),
            result.data.nrows(),
            result.data.ncols(),
            T::ELEMENT_TYPE.as_str()
        );
        Ok(result)
    }

    fn read_columns(&self, requested: Option<&[EntityRef]>) -> GdbResult<Vec<Column>> {
        let requested = match requested {
            Some(channels) => channels.to_vec(),
            None => self.default_channel_order()?,
        };

        let mut columns = Vec::new();
        for channel in &requested {
            let (name, symbol) = self.resolve_channel(channel)?;
            let record = self.channel_record(symbol)?;
            let format = record.text_format();
            if name != record.name {
                if let Some((_, index)) = parse_column_name(&name) {
                    columns.push(Column {
                        name,
                        symbol,
                        index: index as usize,
                        format,
                    });
                    continue;
                }
            }
            if record.is_array() {
                columns.extend((0..record.array_width).map(|index| Column {
                    name: column_name(&record.name, index),
                    symbol,
                    index: index as usize,
                    format,
                }));
            } else {
                columns.push(Column {
                    name,
                    symbol,
                    index: 0,
                    format,
                });
            }
        }
        Ok(columns)
    }

    /// Every channel sorted case-insensitively, designated X, Y, Z first.
    fn default_channel_order(&self) -> GdbResult<Vec<EntityRef>> {
        let mut leading = Vec::new();
        for axis in CoordinateAxis::ALL {
            if let Some(name) = self.xyz_channel(axis)? {
                if !leading.iter().any(|known: &String| name_key(known) == name_key(&name)) {
                    leading.push(name);
                }
            }
        }

        let mut rest = self
            .channels(ChannelFilter::All)?
            .into_keys()
            .filter(|name| !leading.iter().any(|known| name_key(known) == name_key(name)))
            .collect::<Vec<_>>();
        rest.sort_by_key(|name| name_key(name));

        Ok(leading
            .into_iter()
            .chain(rest)
            .map(EntityRef::Name)
            .collect())
    }
}

fn remove_dummy_rows<T: Element>(line: LineData<T>) -> LineData<T> {
    let keep = line
        .data
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| !row.iter().any(|value| value.is_dummy()))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    LineData {
        data: line.data.select(Axis(0), &keep),
        channels: line.channels,
        fiducial: Fiducial::INDEX,
    }
}

fn remove_dummy_columns<T: Element>(line: LineData<T>) -> LineData<T> {
    let keep = line
        .data
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, column)| !column.iter().any(|value| value.is_dummy()))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let channels = keep
        .iter()
        .map(|index| line.channels[*index].clone())
        .collect();
    LineData {
        data: line.data.select(Axis(1), &keep),
        channels,
        fiducial: line.fiducial,
    }
}
