//! Fiducial sample grid.
//!
//! # Invariants
//! - `increment > 0` and both parts are finite.
//! - "Unset" is represented as `Option<Fiducial>::None`, never as a pair.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Relative tolerance used when deciding whether two sample positions coincide.
pub const POSITION_TOLERANCE: f64 = 1.0e-9;

/// `(start, increment)` grid: sample `i` sits at `start + i * increment`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fiducial {
    start: f64,
    increment: f64,
}

/// Rejected fiducial pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidFiducial {
    pub start: f64,
    pub increment: f64,
}

impl Display for InvalidFiducial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid fiducial ({}, {}): increment must be positive and both values finite",
            self.start, self.increment
        )
    }
}

impl std::error::Error for InvalidFiducial {}

impl Fiducial {
    /// Positional-meaning-free grid used once rows were removed.
    pub const INDEX: Fiducial = Fiducial {
        start: 0.0,
        increment: 1.0,
    };

    pub fn new(start: f64, increment: f64) -> Result<Self, InvalidFiducial> {
        if !start.is_finite() || !increment.is_finite() || increment <= 0.0 {
            return Err(InvalidFiducial { start, increment });
        }
        Ok(Self { start, increment })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Position of sample `index`.
    pub fn position(&self, index: usize) -> f64 {
        self.start + index as f64 * self.increment
    }

    /// Index on this grid of sample `index` of `target`, if the two samples
    /// coincide.
    ///
    /// The offset is computed from the start difference and the increment
    /// ratio rather than from absolute positions, so large starts such as
    /// epoch seconds keep their alignment. The tolerance grows with the
    /// magnitude of the operands, in units of this grid's increment.
    pub fn source_index(&self, target: &Fiducial, index: usize) -> Option<usize> {
        if self == target {
            return Some(index);
        }
        let ratio = target.increment / self.increment;
        let offset = (target.start - self.start) / self.increment + index as f64 * ratio;
        let nearest = offset.round();
        let magnitude = self.start.abs().max(target.start.abs()) / self.increment
            + index as f64 * ratio;
        let tolerance = POSITION_TOLERANCE.max(16.0 * f64::EPSILON * magnitude);
        if nearest < 0.0 || (offset - nearest).abs() > tolerance {
            return None;
        }
        Some(nearest as usize)
    }

    /// Common grid of several fiducials: smallest start, smallest increment.
    pub fn common<'a>(fiducials: impl IntoIterator<Item = &'a Fiducial>) -> Option<Fiducial> {
        fiducials.into_iter().fold(None, |acc: Option<Fiducial>, fid| {
            Some(match acc {
                None => *fid,
                Some(current) => Fiducial {
                    start: current.start.min(fid.start),
                    increment: current.increment.min(fid.increment),
                },
            })
        })
    }
}

impl Default for Fiducial {
    fn default() -> Self {
        Self::INDEX
    }
}

impl Display for Fiducial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.start, self.increment)
    }
}
