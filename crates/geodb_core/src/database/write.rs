//! Line write pipeline.
//!
//! # Responsibility
//! - Store dense 1-D or 2-D data into one channel of a line.
//! - Split a dense line array into channels, creating channels as needed.
//!
//! # Invariants
//! - Writes create the target line when missing; reads never do.
//! - Stored data always has the channel's element type and array width.
//! - Channel data is write-locked only while it is stored.

use super::Database;
use crate::error::{GdbError, GdbResult};
use crate::lock::LockMode;
use crate::model::channel::NewChannel;
use crate::model::element::Element;
use crate::model::fiducial::Fiducial;
use crate::model::symbol::{EntityRef, SymbolKind};
use crate::model::vector::{ChannelVector, Vector, WideVector};
use crate::store::CatalogStore;
use log::debug;
use ndarray::{ArrayViewD, Axis, Ix1, Ix2};

/// Channel naming for [`Database::write_data_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTargets {
    /// One channel; multi-column data makes it an array channel.
    Single(String),
    /// One scalar channel per column.
    List(Vec<String>),
}

impl From<&str> for ChannelTargets {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ChannelTargets {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for ChannelTargets {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl<const N: usize> From<[&str; N]> for ChannelTargets {
    fn from(value: [&str; N]) -> Self {
        Self::List(value.iter().map(|name| name.to_string()).collect())
    }
}

impl<S: CatalogStore> Database<S> {
    /// Stores `data` for one (line, channel) pair.
    ///
    /// Scalar channels take 1-D data; an array channel of width `w` takes
    /// 2-D data with `w` columns. The channel must exist; the line is
    /// created once the data has been validated.
    pub fn write_data_chan<T: Element>(
        &self,
        line: impl Into<EntityRef>,
        channel: impl Into<EntityRef>,
        data: ArrayViewD<'_, T>,
        fiducial: Fiducial,
    ) -> GdbResult<()> {
        let channel = channel.into();
        let (channel_name, channel_symbol) = self
            .lookup(SymbolKind::Channel, &channel)?
            .ok_or_else(|| GdbError::not_found(SymbolKind::Channel, channel.describe()))?;
        let record = self.channel_record(channel_symbol)?;
        if record.protect {
            return Err(GdbError::ChannelProtected {
                channel: channel_name,
            });
        }

        let shape = data.shape().to_vec();
        let vector = if record.is_array() {
            let rows = data.into_dimensionality::<Ix2>().map_err(|_| {
                GdbError::invalid_argument(format!(
                    "array channel '{channel_name}' needs 2-D data, got shape {shape:?}"
                ))
            })?;
            if rows.ncols() != record.array_width as usize {
                return Err(GdbError::invalid_argument(format!(
                    "array channel '{channel_name}' has {} columns, data has {}",
                    record.array_width,
                    rows.ncols()
                )));
            }
            ChannelVector::from_wide(WideVector::from_matrix(rows.to_owned(), fiducial))
        } else {
            let values = data.into_dimensionality::<Ix1>().map_err(|_| {
                GdbError::invalid_argument(format!(
                    "channel '{channel_name}' needs 1-D data, got shape {shape:?}"
                ))
            })?;
            ChannelVector::from_vector(Vector::from_dense(values.to_vec(), fiducial))
        };
        let vector = vector.converted(record.element_type, &record.text_format());
        let (_, line_symbol) = self.resolve_line(line, true)?;

        let _guard = self.lock(channel_symbol, LockMode::Write)?;
        self.store()
            .put_vector(line_symbol, channel_symbol, &vector)?;
        debug!(
            "event=write_data_chan module=write status=ok line={} channel={} rows={} width={}",
            line_symbol.raw(),
            channel_symbol.raw(),
            vector.rows(),
            vector.width
        );
        Ok(())
    }

    /// Splits `data` into channels of one line.
    ///
    /// Missing channels are created with element type `T`.
    pub fn write_data_line<T: Element>(
        &self,
        line: impl Into<EntityRef>,
        data: ArrayViewD<'_, T>,
        channels: impl Into<ChannelTargets>,
        fiducial: Fiducial,
    ) -> GdbResult<()> {
        let columns = match data.ndim() {
            1 => 1,
            2 => data.shape()[1],
            other => {
                return Err(GdbError::invalid_argument(format!(
                    "line data must be 1-D or 2-D, got {other} dimensions"
                )))
            }
        };
        if columns == 0 {
            return Err(GdbError::invalid_argument("line data has no columns"));
        }
        let line = line.into();

        match channels.into() {
            ChannelTargets::Single(name) => {
                let width = u32::try_from(columns).map_err(|_| {
                    GdbError::invalid_argument(format!("{columns} columns exceed channel width"))
                })?;
                let symbol = self.new_channel(&name, &NewChannel::array(T::ELEMENT_TYPE, width))?;
                if width == 1 && data.ndim() == 2 {
                    self.write_data_chan(line, symbol, data.index_axis(Axis(1), 0), fiducial)
                } else {
                    self.write_data_chan(line, symbol, data, fiducial)
                }
            }
            ChannelTargets::List(names) => {
                if names.len() != columns {
                    return Err(GdbError::invalid_argument(format!(
                        "data has {columns} columns, {} channels named",
                        names.len()
                    )));
                }
                for (index, name) in names.iter().enumerate() {
                    let symbol = self.new_channel(name, &NewChannel::of(T::ELEMENT_TYPE))?;
                    let column = if data.ndim() == 2 {
                        data.index_axis(Axis(1), index)
                    } else {
                        data.view()
                    };
                    self.write_data_chan(&line, symbol, column, fiducial)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelTargets;

    #[test]
    fn targets_convert_from_names() {
        assert_eq!(
            ChannelTargets::from("ARR"),
            ChannelTargets::Single("ARR".to_string())
        );
        assert_eq!(
            ChannelTargets::from(["X", "Y"]),
            ChannelTargets::List(vec!["X".to_string(), "Y".to_string()])
        );
    }
}
