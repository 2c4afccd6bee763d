//! Fiducial-tagged vectors and position-aligned resampling.
//!
//! # Responsibility
//! - Carry samples together with the grid they were measured on.
//! - Realign samples onto another grid without interpolation.
//!
//! # Invariants
//! - A vector with no stored data has length 0 and no fiducial.
//! - Resampling copies a source sample only where its position coincides with
//!   the target position; every other output sample is the dummy.
//! - Resampling onto the vector's own fiducial and length is the identity.

use crate::model::element::{Element, ElementType, Samples, TextFormat};
use crate::model::fiducial::Fiducial;
use ndarray::{Array2, ArrayView2};

/// One-dimensional fiducial-tagged vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T> {
    fiducial: Option<Fiducial>,
    values: Vec<T>,
}

impl<T: Element> Vector<T> {
    /// Wraps a dense buffer; the element type is inferred from `T`.
    pub fn from_dense(values: impl Into<Vec<T>>, fiducial: Fiducial) -> Self {
        Self {
            fiducial: Some(fiducial),
            values: values.into(),
        }
    }

    /// Vector without data or fiducial.
    pub fn empty() -> Self {
        Self {
            fiducial: None,
            values: Vec::new(),
        }
    }

    pub(crate) fn from_parts(fiducial: Option<Fiducial>, values: Vec<T>) -> Self {
        Self { fiducial, values }
    }

    pub fn element_type(&self) -> ElementType {
        T::ELEMENT_TYPE
    }

    pub fn fiducial(&self) -> Option<Fiducial> {
        self.fiducial
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    /// Whether this vector already sits on `fiducial` with `length` samples.
    pub fn is_aligned(&self, fiducial: Fiducial, length: usize) -> bool {
        self.fiducial == Some(fiducial) && self.values.len() == length
    }

    /// Realigns samples onto `target` with exactly `length` samples.
    pub fn resample(&self, target: Fiducial, length: usize) -> Vector<T> {
        if self.is_aligned(target, length) {
            return self.clone();
        }

        let values = match self.fiducial {
            Some(source) => (0..length)
                .map(|index| {
                    source
                        .source_index(&target, index)
                        .and_then(|source_index| self.values.get(source_index))
                        .cloned()
                        .unwrap_or_else(T::dummy)
                })
                .collect(),
            None => vec![T::dummy(); length],
        };

        Vector {
            fiducial: Some(target),
            values,
        }
    }
}

/// Array-channel vector: `rows x width` samples sharing one fiducial.
#[derive(Debug, Clone, PartialEq)]
pub struct WideVector<T> {
    fiducial: Option<Fiducial>,
    rows: Array2<T>,
}

impl<T: Element> WideVector<T> {
    /// Wraps a 2-D buffer; one row per sample position.
    pub fn from_matrix(rows: Array2<T>, fiducial: Fiducial) -> Self {
        Self {
            fiducial: Some(fiducial),
            rows,
        }
    }

    pub fn fiducial(&self) -> Option<Fiducial> {
        self.fiducial
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    pub fn width(&self) -> usize {
        self.rows.ncols()
    }

    pub fn rows(&self) -> ArrayView2<'_, T> {
        self.rows.view()
    }

    /// Extracts one column as a scalar vector.
    pub fn column(&self, index: usize) -> Vector<T> {
        Vector {
            fiducial: self.fiducial,
            values: self.rows.column(index).to_vec(),
        }
    }
}

/// Type-erased vector as kept by a storage backend for one (line, channel).
///
/// Samples are stored row-major: row `r`, column `c` lives at `r * width + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelVector {
    pub fiducial: Option<Fiducial>,
    pub width: u32,
    pub samples: Samples,
}

impl ChannelVector {
    pub fn empty(element_type: ElementType, width: u32) -> Self {
        Self {
            fiducial: None,
            width: width.max(1),
            samples: Samples::dummies(element_type, 0),
        }
    }

    pub fn from_vector<T: Element>(vector: Vector<T>) -> Self {
        Self {
            fiducial: vector.fiducial,
            width: 1,
            samples: T::into_samples(vector.values),
        }
    }

    pub fn from_wide<T: Element>(vector: WideVector<T>) -> Self {
        let width = vector.width().max(1) as u32;
        let fiducial = vector.fiducial;
        let values = vector.rows.iter().cloned().collect::<Vec<T>>();
        Self {
            fiducial,
            width,
            samples: T::into_samples(values),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.samples.element_type()
    }

    pub fn rows(&self) -> usize {
        self.samples.len() / self.width.max(1) as usize
    }

    /// Converts into the storage element type of a channel.
    pub fn converted(self, element_type: ElementType, format: &TextFormat) -> Self {
        let samples = if self.samples.element_type() == element_type {
            self.samples.finite()
        } else {
            self.samples.convert(element_type, format)
        };
        Self { samples, ..self }
    }

    /// Reads column `index` as `T`.
    pub fn column<T: Element>(&self, index: usize, format: &TextFormat) -> Vector<T> {
        let width = self.width.max(1) as usize;
        let values = self.samples.to_values::<T>(format);
        if width == 1 {
            return Vector::from_parts(self.fiducial, values);
        }
        let column = values.into_iter().skip(index).step_by(width).collect();
        Vector::from_parts(self.fiducial, column)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelVector, Vector, WideVector};
    use crate::model::element::{ElementType, TextFormat, DOUBLE_DUMMY, LONG_DUMMY};
    use crate::model::fiducial::Fiducial;
    use ndarray::array;

    fn fid(start: f64, increment: f64) -> Fiducial {
        Fiducial::new(start, increment).unwrap()
    }

    #[test]
    fn resample_onto_own_grid_is_identity() {
        let vector = Vector::from_dense(vec![1.0, 2.0, DOUBLE_DUMMY, 4.0], fid(3.0, 0.5));
        let resampled = vector.resample(fid(3.0, 0.5), 4);
        assert_eq!(resampled, vector);
    }

    #[test]
    fn resample_aligns_positions_without_interpolation() {
        let vector = Vector::from_dense(vec![10_i32, 20, 30], fid(0.0, 2.0));
        let resampled = vector.resample(fid(0.0, 1.0), 6);
        assert_eq!(
            resampled.values(),
            &[10, LONG_DUMMY, 20, LONG_DUMMY, 30, LONG_DUMMY]
        );
        assert_eq!(resampled.fiducial(), Some(fid(0.0, 1.0)));
    }

    #[test]
    fn resample_shifts_by_start_offset() {
        let vector = Vector::from_dense(vec![1.0, 2.0, 3.0], fid(2.0, 1.0));
        let resampled = vector.resample(fid(0.0, 1.0), 5);
        assert_eq!(resampled.values(), &[DOUBLE_DUMMY, DOUBLE_DUMMY, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn resample_keeps_samples_on_an_epoch_grid() {
        let epoch = fid(1.3e9, 0.1);
        let vector = Vector::from_dense(vec![1.0, 2.0, 3.0], epoch);

        let longer = vector.resample(epoch, 5);
        assert_eq!(longer.values(), &[1.0, 2.0, 3.0, DOUBLE_DUMMY, DOUBLE_DUMMY]);

        let finer = vector.resample(fid(1.3e9, 0.05), 6);
        assert_eq!(
            finer.values(),
            &[1.0, DOUBLE_DUMMY, 2.0, DOUBLE_DUMMY, 3.0, DOUBLE_DUMMY]
        );
    }

    #[test]
    fn resample_without_fiducial_yields_dummies() {
        let vector: Vector<f64> = Vector::empty();
        let resampled = vector.resample(fid(0.0, 1.0), 3);
        assert_eq!(resampled.values(), &[DOUBLE_DUMMY; 3]);
    }

    #[test]
    fn element_type_is_inferred_from_buffer() {
        let vector = Vector::from_dense(vec![1.0_f32], fid(0.0, 1.0));
        assert_eq!(vector.element_type(), ElementType::Float);
    }

    #[test]
    fn wide_vectors_store_row_major_and_split_columns() {
        let wide = WideVector::from_matrix(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], fid(0.0, 1.0));
        assert_eq!(wide.column(1).values(), &[2.0, 4.0, 6.0]);

        let stored = ChannelVector::from_wide(wide);
        assert_eq!(stored.width, 2);
        assert_eq!(stored.rows(), 3);
        let column: Vector<f64> = stored.column(0, &TextFormat::default());
        assert_eq!(column.values(), &[1.0, 3.0, 5.0]);
    }
}
