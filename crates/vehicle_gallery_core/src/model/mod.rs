//! Gallery domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by gallery business logic.
//!
//! # Invariants
//! - Every image is identified by a stable `ImageId` and owned by exactly one
//!   `VehicleId`.
//! - Deletion is a hard delete; no tombstones are kept.

pub mod image;
