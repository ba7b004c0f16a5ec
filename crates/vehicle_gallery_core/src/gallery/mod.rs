//! Per-vehicle gallery bookkeeping.
//!
//! # Responsibility
//! - Maintain contiguous positions and the single-primary rule on top of a
//!   `GalleryStore`.
//!
//! # Invariants
//! - Helpers here never lock; the gallery service serializes writers per vehicle.

pub mod position;
pub mod primary;

pub use position::{validate_permutation, PositionManager, PositionShift};
pub use primary::PrimarySelector;
