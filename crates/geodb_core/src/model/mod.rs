//! Domain model for the channel database.
//!
//! # Responsibility
//! - Define catalog records for lines and channels.
//! - Define the fiducial grid, vectors and element types shared by both the
//!   read and write pipelines.
//!
//! # Invariants
//! - Every catalog entity is identified by a stable `Symbol`.
//! - Missing data is a per-type dummy value, never a side flag.

pub mod channel;
pub mod element;
pub mod fiducial;
pub mod line;
pub mod symbol;
pub mod vector;
