//! File-level image operations.
//!
//! # Responsibility
//! - Persist, read and delete original image files.
//! - Probe formats and dimensions, derive thumbnails and optimized copies.
//! - Summarize what is stored under the upload root.
//!
//! # Invariants
//! - Thumbnails live at `{dir}/thumbnails/{stem}_thumb{ext}` next to the source.
//! - Optimized copies live at `{dir}/{stem}_optimized{ext}`.
//! - Resizing preserves aspect ratio and never upscales.

use crate::model::image::{file_extension, is_allowed_extension, round_2, THUMBNAIL_SIZE};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const THUMBNAIL_DIR: &str = "thumbnails";
const THUMBNAIL_QUALITY: u8 = 85;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Debug)]
pub enum ProcessorError {
    /// Reading or writing a file failed.
    Storage { path: PathBuf, source: io::Error },
    /// Source could not be decoded or the derivative could not be encoded.
    Processing { path: PathBuf, message: String },
    InvalidQuality(u8),
}

impl ProcessorError {
    fn storage(path: &Path, source: io::Error) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            source,
        }
    }

    fn processing(path: &Path, message: impl Into<String>) -> Self {
        Self::Processing {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl Display for ProcessorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { path, source } => {
                write!(f, "file operation on `{}` failed: {source}", path.display())
            }
            Self::Processing { path, message } => {
                write!(f, "cannot process `{}`: {message}", path.display())
            }
            Self::InvalidQuality(quality) => {
                write!(f, "quality {quality} must be between 1 and 100")
            }
        }
    }
}

impl Error for ProcessorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Summary of files stored under an upload root.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStatistics {
    /// Original files, thumbnails excluded.
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub average_file_size_mb: f64,
    pub thumbnails_count: usize,
    /// Extension (with dot) to original file count.
    pub formats_distribution: BTreeMap<String, usize>,
}

/// File-level image operations used by the gallery service.
pub trait ImageProcessor: Send + Sync {
    /// Extension is allowed and the header decodes as an image.
    fn validate_image_format(&self, path: &Path) -> bool;
    fn get_image_dimensions(&self, path: &Path) -> Option<(u32, u32)>;
    /// Writes `bytes` to `path`, creating parent directories.
    fn save_file(&self, bytes: &[u8], path: &Path) -> ProcessorResult<PathBuf>;
    fn read_file(&self, path: &Path) -> ProcessorResult<Vec<u8>>;
    /// Removes a file. Returns `false` when nothing was removed.
    fn delete_file(&self, path: &Path) -> bool;
    /// Writes a downscaled copy bounded by `size` and returns its path.
    fn generate_thumbnail(&self, path: &Path, size: (u32, u32)) -> ProcessorResult<PathBuf>;
    fn should_generate_thumbnail(&self, path: &Path) -> bool;
    /// Re-encodes `path` with the given quality (`1..=100`) and returns the copy's path.
    fn optimize_image(&self, path: &Path, quality: u8) -> ProcessorResult<PathBuf>;
    fn get_storage_statistics(&self) -> ProcessorResult<StorageStatistics>;
}

/// `ImageProcessor` on the local filesystem using the `image` crate.
#[derive(Debug, Clone)]
pub struct FsImageProcessor {
    root: PathBuf,
    thumbnail_size: (u32, u32),
}

impl FsImageProcessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            thumbnail_size: THUMBNAIL_SIZE,
        }
    }

    pub fn with_thumbnail_size(mut self, size: (u32, u32)) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageProcessor for FsImageProcessor {
    fn validate_image_format(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        is_allowed_extension(name) && image::image_dimensions(path).is_ok()
    }

    fn get_image_dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        image::image_dimensions(path).ok()
    }

    fn save_file(&self, bytes: &[u8], path: &Path) -> ProcessorResult<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ProcessorError::storage(parent, err))?;
        }
        std::fs::write(path, bytes).map_err(|err| ProcessorError::storage(path, err))?;
        debug!(
            "event=file_save module=media status=ok bytes={} path={}",
            bytes.len(),
            path.display()
        );
        Ok(path.to_path_buf())
    }

    fn read_file(&self, path: &Path) -> ProcessorResult<Vec<u8>> {
        std::fs::read(path).map_err(|err| ProcessorError::storage(path, err))
    }

    fn delete_file(&self, path: &Path) -> bool {
        std::fs::remove_file(path).is_ok()
    }

    fn generate_thumbnail(&self, path: &Path, size: (u32, u32)) -> ProcessorResult<PathBuf> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(ProcessorError::processing(
                path,
                "thumbnail bounds must be non-zero",
            ));
        }
        if !path.is_file() {
            return Err(ProcessorError::processing(path, "source file does not exist"));
        }

        let source = image::open(path)
            .map_err(|err| ProcessorError::processing(path, format!("decode failed: {err}")))?;
        let thumbnail = if source.width() <= width && source.height() <= height {
            source
        } else {
            source.resize(width, height, FilterType::Lanczos3)
        };

        let target = thumbnail_path_for(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ProcessorError::storage(parent, err))?;
        }
        encode_to(&thumbnail, &target, THUMBNAIL_QUALITY)?;
        debug!(
            "event=thumbnail_write module=media status=ok width={} height={}",
            thumbnail.width(),
            thumbnail.height()
        );
        Ok(target)
    }

    fn should_generate_thumbnail(&self, path: &Path) -> bool {
        if !path.is_file() || !self.validate_image_format(path) {
            return false;
        }
        if thumbnail_path_for(path).is_file() {
            return false;
        }
        match self.get_image_dimensions(path) {
            Some((width, height)) => {
                width > self.thumbnail_size.0 || height > self.thumbnail_size.1
            }
            None => false,
        }
    }

    fn optimize_image(&self, path: &Path, quality: u8) -> ProcessorResult<PathBuf> {
        if !(1..=100).contains(&quality) {
            return Err(ProcessorError::InvalidQuality(quality));
        }
        let source = image::open(path)
            .map_err(|err| ProcessorError::processing(path, format!("decode failed: {err}")))?;

        let target = optimized_path_for(path);
        encode_to(&source, &target, quality)?;
        Ok(target)
    }

    fn get_storage_statistics(&self) -> ProcessorResult<StorageStatistics> {
        let mut stats = StorageStatistics::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(self.root.as_path()).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop"));
                ProcessorError::Storage { path, source }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let in_thumbnail_dir = entry
                .path()
                .parent()
                .and_then(|parent| parent.file_name())
                .is_some_and(|name| name == OsStr::new(THUMBNAIL_DIR));
            if in_thumbnail_dir {
                stats.thumbnails_count += 1;
                continue;
            }

            let size = entry
                .metadata()
                .map(|metadata| metadata.len())
                .unwrap_or(0);
            stats.total_files += 1;
            stats.total_size_bytes += size;
            let extension = entry
                .file_name()
                .to_str()
                .map(file_extension)
                .unwrap_or_default();
            *stats.formats_distribution.entry(extension).or_insert(0) += 1;
        }

        stats.total_size_mb = round_2(stats.total_size_bytes as f64 / BYTES_PER_MB);
        if stats.total_files > 0 {
            stats.average_file_size_mb = round_2(
                stats.total_size_bytes as f64 / BYTES_PER_MB / stats.total_files as f64,
            );
        }
        Ok(stats)
    }
}

/// Thumbnail location derived from the original file path.
pub fn thumbnail_path_for(path: &Path) -> PathBuf {
    derived_path(path, Some(THUMBNAIL_DIR), "_thumb")
}

/// Optimized-copy location derived from the original file path.
pub fn optimized_path_for(path: &Path) -> PathBuf {
    derived_path(path, None, "_optimized")
}

fn derived_path(path: &Path, subdir: Option<&str>, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let mut dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    if let Some(subdir) = subdir {
        dir.push(subdir);
    }
    dir.join(format!("{stem}{suffix}{extension}"))
}

fn encode_to(image: &DynamicImage, target: &Path, quality: u8) -> ProcessorResult<()> {
    let format = ImageFormat::from_path(target)
        .map_err(|err| ProcessorError::processing(target, format!("unknown format: {err}")))?;

    let encoded = match format {
        ImageFormat::Jpeg => {
            let file = File::create(target).map_err(|err| ProcessorError::storage(target, err))?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::WebP => {
            DynamicImage::ImageRgba8(image.to_rgba8()).save_with_format(target, format)
        }
        _ => image.save_with_format(target, format),
    };
    encoded.map_err(|err| ProcessorError::processing(target, format!("encode failed: {err}")))
}
