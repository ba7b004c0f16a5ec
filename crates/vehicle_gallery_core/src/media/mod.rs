//! Media file handling behind the `ImageProcessor` seam.

pub mod processor;

pub use processor::{
    optimized_path_for, thumbnail_path_for, FsImageProcessor, ImageProcessor, ProcessorError,
    ProcessorResult, StorageStatistics,
};
