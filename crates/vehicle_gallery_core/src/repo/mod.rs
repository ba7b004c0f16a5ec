//! Repository layer for gallery persistence.
//!
//! # Responsibility
//! - Define the storage contract consumed by gallery services.
//! - Provide SQLite and in-memory implementations of that contract.
//!
//! # Invariants
//! - Services depend on `GalleryStore`, never on a concrete store.

pub mod image_repo;
pub mod memory_store;

pub use image_repo::{
    GalleryStore, ImageListQuery, ImageOrder, ImagePage, SortDirection, SqliteGalleryStore,
    StoreError, StoreResult,
};
pub use memory_store::InMemoryGalleryStore;
