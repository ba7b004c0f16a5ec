//! Vehicle image domain model.
//!
//! # Responsibility
//! - Define the canonical metadata record for one gallery image.
//! - Provide entity-level validation and derived file facts.
//!
//! # Invariants
//! - `id` is stable and never reused for another image.
//! - `vehicle_id` never changes after creation.
//! - `position` is 1-based and never above `MAX_POSITION`.
//! - `filename` carries one of `ALLOWED_EXTENSIONS`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of one image record.
pub type ImageId = Uuid;

/// Identifier of the owning vehicle. Vehicles live outside this crate.
pub type VehicleId = Uuid;

/// Lower-case extensions (with dot) accepted for gallery images.
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];
/// Default gallery capacity per vehicle.
pub const MAX_IMAGES_PER_VEHICLE: u32 = 10;
/// Hard upper bound of a stored position, independent of configured capacity.
pub const MAX_POSITION: u32 = 99;
/// Default upload size limit (10 MB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Default thumbnail bounding box.
pub const THUMBNAIL_SIZE: (u32, u32) = (300, 300);

const MAX_FILENAME_LENGTH: usize = 255;
const MAX_PATH_LENGTH: usize = 500;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid filename regex"));

/// Entity-level validation failures for `ImageRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageValidationError {
    EmptyFilename,
    FilenameTooLong(usize),
    InvalidFilenameCharacters(String),
    MissingExtension(String),
    UnsupportedExtension(String),
    EmptyPath,
    PathTooLong(usize),
    PositionOutOfRange(u32),
}

impl Display for ImageValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFilename => write!(f, "filename must not be empty"),
            Self::FilenameTooLong(len) => write!(
                f,
                "filename has {len} characters, at most {MAX_FILENAME_LENGTH} allowed"
            ),
            Self::InvalidFilenameCharacters(name) => write!(
                f,
                "filename `{name}` may only contain letters, digits, `.`, `_` and `-`"
            ),
            Self::MissingExtension(name) => write!(f, "filename `{name}` has no extension"),
            Self::UnsupportedExtension(ext) => write!(
                f,
                "extension `{ext}` is not allowed; expected one of {}",
                ALLOWED_EXTENSIONS.join(", ")
            ),
            Self::EmptyPath => write!(f, "path must not be empty"),
            Self::PathTooLong(len) => {
                write!(f, "path has {len} characters, at most {MAX_PATH_LENGTH} allowed")
            }
            Self::PositionOutOfRange(position) => {
                write!(f, "position {position} must be between 1 and {MAX_POSITION}")
            }
        }
    }
}

impl Error for ImageValidationError {}

/// Image shape derived from probed dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

/// Canonical metadata record for one vehicle image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable id, assigned on creation.
    pub id: ImageId,
    /// Owning vehicle.
    pub vehicle_id: VehicleId,
    /// Stored file name (`[A-Za-z0-9._-]+` with an allowed extension).
    pub filename: String,
    /// Location of the original file.
    pub path: String,
    /// Present once a thumbnail has been generated.
    pub thumbnail_path: Option<String>,
    /// 1-based display rank within the vehicle gallery.
    pub position: u32,
    /// Cover image flag; at most one per vehicle.
    pub is_primary: bool,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
    /// Unix epoch milliseconds.
    pub uploaded_at: i64,
    /// Unix epoch milliseconds, refreshed by every store write.
    pub updated_at: i64,
}

impl ImageRecord {
    /// Creates a non-primary record with a generated id.
    ///
    /// Position and primary status are owned by the gallery service; callers
    /// outside it should treat the initial values as placeholders.
    pub fn new(
        vehicle_id: VehicleId,
        filename: impl Into<String>,
        path: impl Into<String>,
        position: u32,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), vehicle_id, filename, path, position)
    }

    /// Creates a record with a caller-provided id.
    pub fn with_id(
        id: ImageId,
        vehicle_id: VehicleId,
        filename: impl Into<String>,
        path: impl Into<String>,
        position: u32,
    ) -> Self {
        let now = now_epoch_ms();
        Self {
            id,
            vehicle_id,
            filename: filename.into().trim().to_string(),
            path: path.into().trim().replace('\\', "/"),
            thumbnail_path: None,
            position,
            is_primary: false,
            file_size: None,
            width: None,
            height: None,
            mime_type: None,
            uploaded_at: now,
            updated_at: now,
        }
    }

    /// Validates entity-local constraints.
    ///
    /// Cross-record invariants (contiguous positions, single primary) are not
    /// checked here.
    pub fn validate(&self) -> Result<(), ImageValidationError> {
        validate_filename(&self.filename)?;

        let path = self.path.trim();
        if path.is_empty() {
            return Err(ImageValidationError::EmptyPath);
        }
        let path_len = path.chars().count();
        if path_len > MAX_PATH_LENGTH {
            return Err(ImageValidationError::PathTooLong(path_len));
        }

        if self.position < 1 || self.position > MAX_POSITION {
            return Err(ImageValidationError::PositionOutOfRange(self.position));
        }
        Ok(())
    }

    /// Lower-case extension including the dot, or empty when absent.
    pub fn extension(&self) -> String {
        file_extension(&self.filename)
    }

    /// Filename without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(self.filename.as_str())
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_path
            .as_deref()
            .is_some_and(|path| !path.trim().is_empty())
    }

    /// Width divided by height, when both are known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(f64::from(width) / f64::from(height))
            }
            _ => None,
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some(if width > height {
                Orientation::Landscape
            } else if width < height {
                Orientation::Portrait
            } else {
                Orientation::Square
            }),
            _ => None,
        }
    }

    /// File size in megabytes rounded to two decimals.
    pub fn file_size_mb(&self) -> Option<f64> {
        self.file_size
            .map(|size| round_2(size as f64 / BYTES_PER_MB))
    }
}

/// Validates a bare filename: non-empty, bounded, safe characters, allowed extension.
pub fn validate_filename(filename: &str) -> Result<(), ImageValidationError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(ImageValidationError::EmptyFilename);
    }
    let len = trimmed.chars().count();
    if len > MAX_FILENAME_LENGTH {
        return Err(ImageValidationError::FilenameTooLong(len));
    }
    if !FILENAME_RE.is_match(trimmed) {
        return Err(ImageValidationError::InvalidFilenameCharacters(
            trimmed.to_string(),
        ));
    }

    let extension = file_extension(trimmed);
    if extension.is_empty() {
        return Err(ImageValidationError::MissingExtension(trimmed.to_string()));
    }
    if !is_allowed_extension(trimmed) {
        return Err(ImageValidationError::UnsupportedExtension(extension));
    }
    Ok(())
}

/// Returns whether `filename` ends with one of `ALLOWED_EXTENSIONS` (case-insensitive).
pub fn is_allowed_extension(filename: &str) -> bool {
    let extension = file_extension(filename);
    ALLOWED_EXTENSIONS.contains(&extension.as_str())
}

/// Lower-case extension of `filename` including the dot, or empty.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

pub(crate) fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
