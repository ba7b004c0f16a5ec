//! Gallery runtime configuration.
//!
//! # Responsibility
//! - Hold tunable limits and storage locations for the gallery service.
//! - Load partial overrides from JSON on top of built-in defaults.
//!
//! # Invariants
//! - A validated config never allows more images than `MAX_POSITION`.

use crate::model::image::{
    VehicleId, MAX_FILE_SIZE_BYTES, MAX_IMAGES_PER_VEHICLE, MAX_POSITION, THUMBNAIL_SIZE,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LARGE_IMAGE_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// When thumbnails are produced for new uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailMode {
    /// Generated inside `upload`; failures are logged and the upload still succeeds.
    Inline,
    /// Queued and produced by `process_pending_thumbnails`.
    #[default]
    Deferred,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings consumed by `GalleryService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Files are stored under `{upload_root}/vehicles/{vehicle_id}/`.
    pub upload_root: PathBuf,
    pub max_images_per_vehicle: u32,
    pub max_file_size_bytes: u64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub thumbnail_mode: ThumbnailMode,
    /// Images above this size count as large in statistics.
    pub large_image_threshold_bytes: u64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("/uploads"),
            max_images_per_vehicle: MAX_IMAGES_PER_VEHICLE,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            thumbnail_width: THUMBNAIL_SIZE.0,
            thumbnail_height: THUMBNAIL_SIZE.1,
            thumbnail_mode: ThumbnailMode::default(),
            large_image_threshold_bytes: LARGE_IMAGE_THRESHOLD_BYTES,
        }
    }
}

impl GalleryConfig {
    /// Defaults with a different upload root.
    pub fn with_upload_root(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            ..Self::default()
        }
    }

    /// Parses JSON overrides; missing keys keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("upload_root must not be empty".into()));
        }
        if self.max_images_per_vehicle == 0 || self.max_images_per_vehicle > MAX_POSITION {
            return Err(ConfigError::Invalid(format!(
                "max_images_per_vehicle must be between 1 and {MAX_POSITION}, got {}",
                self.max_images_per_vehicle
            )));
        }
        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_file_size_bytes must be positive".into(),
            ));
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail dimensions must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn thumbnail_size(&self) -> (u32, u32) {
        (self.thumbnail_width, self.thumbnail_height)
    }

    /// Canonical storage path of an original file.
    pub fn image_path(&self, vehicle_id: VehicleId, filename: &str) -> PathBuf {
        self.upload_root
            .join("vehicles")
            .join(vehicle_id.to_string())
            .join(filename)
    }
}
