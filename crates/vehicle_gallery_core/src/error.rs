//! Gallery-level error taxonomy.
//!
//! # Responsibility
//! - Define the errors returned by gallery bookkeeping and the gallery service.
//! - Translate store and processor failures into caller-facing categories.
//!
//! # Invariants
//! - `Validation` errors are raised before any side effect.
//! - Store `NotFound`/`Conflict` never leak as `Storage`.

use crate::media::processor::ProcessorError;
use crate::model::image::{ImageId, ImageValidationError, VehicleId};
use crate::repo::image_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GalleryResult<T> = Result<T, GalleryError>;

/// Input rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Filename is empty, too long or has unsafe characters.
    InvalidFilename(ImageValidationError),
    UnsupportedExtension {
        filename: String,
        extension: String,
    },
    /// Declared content type is not `image/*`.
    UnsupportedMimeType(String),
    EmptyFile,
    FileTooLarge {
        size: u64,
        max: u64,
    },
    DuplicateFilename {
        vehicle_id: VehicleId,
        filename: String,
    },
    PositionOutOfRange {
        position: u32,
        min: u32,
        max: u32,
    },
    /// Reorder mapping is not a bijection onto `1..=N`.
    InvalidPermutation(String),
    GalleryFull {
        vehicle_id: VehicleId,
        max: u32,
    },
    InvalidQuality(u8),
    /// Record-level rule not covered by a more specific variant.
    InvalidRecord(ImageValidationError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFilename(err) => write!(f, "invalid filename: {err}"),
            Self::UnsupportedExtension {
                filename,
                extension,
            } => write!(
                f,
                "file `{filename}` has unsupported extension `{extension}`"
            ),
            Self::UnsupportedMimeType(mime) => {
                write!(f, "content type `{mime}` is not an image type")
            }
            Self::EmptyFile => write!(f, "uploaded file is empty"),
            Self::FileTooLarge { size, max } => {
                write!(f, "file has {size} bytes, at most {max} allowed")
            }
            Self::DuplicateFilename {
                vehicle_id,
                filename,
            } => write!(
                f,
                "vehicle {vehicle_id} already has an image named `{filename}`"
            ),
            Self::PositionOutOfRange { position, min, max } => {
                write!(f, "position {position} must be between {min} and {max}")
            }
            Self::InvalidPermutation(reason) => write!(f, "invalid reorder mapping: {reason}"),
            Self::GalleryFull { vehicle_id, max } => {
                write!(f, "vehicle {vehicle_id} already has the maximum of {max} images")
            }
            Self::InvalidQuality(quality) => {
                write!(f, "quality {quality} must be between 1 and 100")
            }
            Self::InvalidRecord(err) => write!(f, "invalid image record: {err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFilename(err) | Self::InvalidRecord(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageValidationError> for ValidationError {
    fn from(value: ImageValidationError) -> Self {
        match value {
            ImageValidationError::UnsupportedExtension(extension) => Self::UnsupportedExtension {
                filename: String::new(),
                extension,
            },
            ImageValidationError::PositionOutOfRange(position) => Self::PositionOutOfRange {
                position,
                min: 1,
                max: crate::model::image::MAX_POSITION,
            },
            err @ (ImageValidationError::EmptyFilename
            | ImageValidationError::FilenameTooLong(_)
            | ImageValidationError::InvalidFilenameCharacters(_)
            | ImageValidationError::MissingExtension(_)) => Self::InvalidFilename(err),
            err => Self::InvalidRecord(err),
        }
    }
}

/// What a `GalleryError::NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundTarget {
    Image(ImageId),
    /// Image exists but not within the given vehicle.
    ImageInVehicle {
        vehicle_id: VehicleId,
        image_id: ImageId,
    },
}

impl Display for NotFoundTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(id) => write!(f, "image {id}"),
            Self::ImageInVehicle {
                vehicle_id,
                image_id,
            } => write!(f, "image {image_id} in vehicle {vehicle_id}"),
        }
    }
}

/// Persistence-side failure behind `GalleryError::Storage`.
#[derive(Debug)]
pub enum StorageFailure {
    Store(StoreError),
    File(ProcessorError),
}

impl Display for StorageFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::File(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::File(err) => Some(err),
        }
    }
}

/// Errors from gallery operations.
#[derive(Debug)]
pub enum GalleryError {
    Validation(ValidationError),
    NotFound(NotFoundTarget),
    /// Request contradicts gallery state (for example unsetting the only primary).
    Conflict(String),
    /// Metadata store or file storage failed.
    Storage(StorageFailure),
    /// Image decoding or transformation failed.
    Processing(ProcessorError),
}

impl Display for GalleryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "not found: {target}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Processing(err) => write!(f, "processing failure: {err}"),
        }
    }
}

impl Error for GalleryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Processing(err) => Some(err),
            Self::NotFound(_) | Self::Conflict(_) => None,
        }
    }
}

impl From<ValidationError> for GalleryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for GalleryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(NotFoundTarget::Image(id)),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Validation(err) => Self::Validation(err.into()),
            other => Self::Storage(StorageFailure::Store(other)),
        }
    }
}

impl GalleryError {
    /// Short machine-readable category, used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
            Self::Processing(_) => "processing",
        }
    }
}
