//! Core domain logic for the vehicle image gallery.
//! This crate is the single source of truth for gallery invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod media;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, GalleryConfig, ThumbnailMode};
pub use error::{GalleryError, GalleryResult, NotFoundTarget, StorageFailure, ValidationError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use media::processor::{FsImageProcessor, ImageProcessor, ProcessorError, StorageStatistics};
pub use model::image::{
    ImageId, ImageRecord, ImageValidationError, Orientation, VehicleId, ALLOWED_EXTENSIONS,
    MAX_FILE_SIZE_BYTES, MAX_IMAGES_PER_VEHICLE, THUMBNAIL_SIZE,
};
pub use repo::image_repo::{
    GalleryStore, ImageListQuery, ImageOrder, ImagePage, SortDirection, SqliteGalleryStore,
    StoreError, StoreResult,
};
pub use repo::memory_store::InMemoryGalleryStore;
pub use service::gallery_service::{
    Gallery, GalleryService, ThumbnailBackfill, ThumbnailFailure, UpdateImageRequest,
    UploadRequest,
};
pub use service::statistics::GalleryStatistics;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
