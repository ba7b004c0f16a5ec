//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, processor and gallery bookkeeping into use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod gallery_service;
pub mod statistics;

pub use gallery_service::{Gallery, GalleryService, UpdateImageRequest, UploadRequest};
pub use statistics::{compute_statistics, GalleryStatistics};
