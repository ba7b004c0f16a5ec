//! Vehicle gallery use-case service.
//!
//! # Responsibility
//! - Validate uploads and gallery edits above the store layer.
//! - Coordinate file storage, metadata persistence, positions and primary election.
//! - Roll back partial uploads so no orphan metadata or file survives a failure.
//!
//! # Invariants
//! - Every mutation of a vehicle gallery runs under that vehicle's write lock.
//! - After every completed operation positions are `1..=N` and a non-empty
//!   gallery has exactly one primary image.
//! - Validation errors are returned before any side effect.

use crate::config::{ConfigError, GalleryConfig, ThumbnailMode};
use crate::error::{GalleryError, GalleryResult, NotFoundTarget, StorageFailure, ValidationError};
use crate::gallery::position::{PositionManager, PositionShift};
use crate::gallery::primary::PrimarySelector;
use crate::media::processor::{ImageProcessor, ProcessorError, StorageStatistics};
use crate::model::image::{validate_filename, ImageId, ImageRecord, ImageValidationError, VehicleId};
use crate::repo::image_repo::{
    GalleryStore, ImageListQuery, ImageOrder, ImagePage, SortDirection,
};
use crate::service::statistics::{compute_statistics, GalleryStatistics};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Input for `GalleryService::upload`.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub vehicle_id: VehicleId,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Declared content type, must be `image/*`.
    pub mime_type: String,
    /// Insert at this slot (`1..=N+1`) instead of appending.
    pub position: Option<u32>,
    pub is_primary: bool,
}

impl UploadRequest {
    /// Append-mode, non-primary upload.
    pub fn new(
        vehicle_id: VehicleId,
        filename: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            vehicle_id,
            filename: filename.into(),
            bytes,
            mime_type: mime_type.into(),
            position: None,
            is_primary: false,
        }
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn as_primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Partial edit for `GalleryService::update`. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateImageRequest {
    pub position: Option<u32>,
    pub is_primary: Option<bool>,
}

/// Ordered snapshot of one vehicle gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gallery {
    pub vehicle_id: VehicleId,
    /// Sorted by position.
    pub images: Vec<ImageRecord>,
    pub total: usize,
    pub primary: Option<ImageRecord>,
}

/// Outcome of `GalleryService::generate_missing_thumbnails`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThumbnailBackfill {
    pub generated: usize,
    /// Images already within thumbnail bounds, or not decodable.
    pub skipped: usize,
    pub failed: Vec<ThumbnailFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailFailure {
    pub image_id: ImageId,
    pub error: String,
}

type VehicleLock = Arc<RwLock<()>>;

/// Vehicle gallery service facade.
pub struct GalleryService<S: GalleryStore, P: ImageProcessor> {
    store: S,
    processor: P,
    config: GalleryConfig,
    locks: Mutex<HashMap<VehicleId, VehicleLock>>,
    pending_thumbnails: Mutex<VecDeque<ImageId>>,
}

impl<S: GalleryStore, P: ImageProcessor> GalleryService<S, P> {
    /// Creates service from store, processor and an already validated configuration.
    pub fn new(store: S, processor: P, config: GalleryConfig) -> Self {
        Self {
            store,
            processor,
            config,
            locks: Mutex::new(HashMap::new()),
            pending_thumbnails: Mutex::new(VecDeque::new()),
        }
    }

    /// Like `new`, but rejects a configuration that fails `GalleryConfig::validate`.
    pub fn try_new(store: S, processor: P, config: GalleryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(store, processor, config))
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Stores a new image and registers it in the vehicle gallery.
    ///
    /// The first image of a vehicle always becomes primary.
    pub fn upload(&self, request: UploadRequest) -> GalleryResult<ImageRecord> {
        let started_at = Instant::now();
        let UploadRequest {
            vehicle_id,
            filename,
            bytes,
            mime_type,
            position,
            is_primary,
        } = request;
        let filename = filename.trim().to_string();

        let result = self.upload_locked(
            vehicle_id,
            &filename,
            &bytes,
            mime_type.trim(),
            position,
            is_primary,
        );
        match &result {
            Ok(record) => info!(
                "event=image_upload module=service status=ok vehicle_id={vehicle_id} image_id={} position={} primary={} bytes={} duration_ms={}",
                record.id,
                record.position,
                record.is_primary,
                bytes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=image_upload module=service status=error vehicle_id={vehicle_id} error_code={} duration_ms={} error={err}",
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn upload_locked(
        &self,
        vehicle_id: VehicleId,
        filename: &str,
        bytes: &[u8],
        mime_type: &str,
        position: Option<u32>,
        is_primary: bool,
    ) -> GalleryResult<ImageRecord> {
        self.validate_upload_input(filename, mime_type, bytes.len() as u64)?;

        let lock = self.vehicle_lock(vehicle_id);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        if self.store.find_by_filename(vehicle_id, filename)?.is_some() {
            return Err(ValidationError::DuplicateFilename {
                vehicle_id,
                filename: filename.to_string(),
            }
            .into());
        }
        let count = self.store.count_by_vehicle(vehicle_id)? as u32;
        let max = self.config.max_images_per_vehicle;
        if count >= max {
            return Err(ValidationError::GalleryFull { vehicle_id, max }.into());
        }
        if let Some(position) = position {
            if position < 1 || position > count + 1 {
                return Err(ValidationError::PositionOutOfRange {
                    position,
                    min: 1,
                    max: count + 1,
                }
                .into());
            }
        }

        let path = self.config.image_path(vehicle_id, filename);
        self.processor
            .save_file(bytes, &path)
            .map_err(|err| GalleryError::Storage(StorageFailure::File(err)))?;
        let dimensions = self.processor.get_image_dimensions(&path);

        let draft = NewImage {
            vehicle_id,
            filename,
            path: &path,
            size: bytes.len() as u64,
            mime_type,
            dimensions,
            position,
            is_primary,
        };
        let mut record = match self.persist_upload(draft) {
            Ok(record) => record,
            Err(err) => {
                if !self.processor.delete_file(&path) {
                    warn!(
                        "event=upload_rollback module=service status=error vehicle_id={vehicle_id} step=delete_file"
                    );
                }
                return Err(err);
            }
        };

        if !self.processor.should_generate_thumbnail(&path) {
            debug!(
                "event=thumbnail_skip module=service status=ok image_id={} reason=within_bounds_or_undecodable",
                record.id
            );
            return Ok(record);
        }
        match self.config.thumbnail_mode {
            ThumbnailMode::Inline => match self.attach_thumbnail(&record) {
                Ok(updated) => record = updated,
                Err(err) => warn!(
                    "event=thumbnail_generate module=service status=error image_id={} error_code={} error={err}",
                    record.id,
                    err.code()
                ),
            },
            ThumbnailMode::Deferred => self.pending_queue().push_back(record.id),
        }

        Ok(record)
    }

    fn validate_upload_input(
        &self,
        filename: &str,
        mime_type: &str,
        size: u64,
    ) -> GalleryResult<()> {
        validate_filename(filename).map_err(|err| match err {
            ImageValidationError::UnsupportedExtension(extension) => {
                ValidationError::UnsupportedExtension {
                    filename: filename.to_string(),
                    extension,
                }
            }
            other => ValidationError::from(other),
        })?;
        if !mime_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ValidationError::UnsupportedMimeType(mime_type.to_string()).into());
        }
        if size == 0 {
            return Err(ValidationError::EmptyFile.into());
        }
        if size > self.config.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.config.max_file_size_bytes,
            }
            .into());
        }
        Ok(())
    }

    fn persist_upload(&self, draft: NewImage<'_>) -> GalleryResult<ImageRecord> {
        let positions = self.positions();
        let primary = self.primary();
        let becomes_primary = draft.is_primary || primary.on_first_upload(draft.vehicle_id)?;

        let (position, shift) = match draft.position {
            Some(target) => (target, positions.insert_at(draft.vehicle_id, target)?),
            None => (
                positions.next_position(draft.vehicle_id)?,
                PositionShift::default(),
            ),
        };

        let mut record = ImageRecord::new(
            draft.vehicle_id,
            draft.filename,
            draft.path.to_string_lossy(),
            position,
        );
        record.file_size = Some(draft.size);
        record.mime_type = Some(draft.mime_type.to_string());
        if let Some((width, height)) = draft.dimensions {
            record.width = Some(width);
            record.height = Some(height);
        }

        let mut stored = match self.store.save(&record) {
            Ok(stored) => stored,
            Err(err) => {
                self.rollback_upload(draft.vehicle_id, None, &shift);
                return Err(err.into());
            }
        };

        if becomes_primary {
            if let Err(err) = primary.set_primary(draft.vehicle_id, stored.id) {
                self.rollback_upload(draft.vehicle_id, Some(stored.id), &shift);
                return Err(err);
            }
            stored.is_primary = true;
        }
        Ok(stored)
    }

    fn rollback_upload(&self, vehicle_id: VehicleId, image_id: Option<ImageId>, shift: &PositionShift) {
        if let Some(image_id) = image_id {
            if let Err(err) = self.store.delete(image_id) {
                error!(
                    "event=upload_rollback module=service status=error vehicle_id={vehicle_id} image_id={image_id} step=delete_record error={err}"
                );
            }
        }
        if !shift.is_empty() {
            if let Err(err) = self.positions().undo_shift(shift) {
                error!(
                    "event=upload_rollback module=service status=error vehicle_id={vehicle_id} step=undo_shift error={err}"
                );
            }
        }
        if let Err(err) = self.primary().ensure_primary(vehicle_id) {
            error!(
                "event=upload_rollback module=service status=error vehicle_id={vehicle_id} step=ensure_primary error={err}"
            );
        }
    }

    /// Changes position and/or primary status of one image.
    pub fn update(
        &self,
        image_id: ImageId,
        request: UpdateImageRequest,
    ) -> GalleryResult<ImageRecord> {
        let vehicle_id = self.get_image(image_id)?.vehicle_id;
        let lock = self.vehicle_lock(vehicle_id);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);
        let image = self.get_image(image_id)?;

        if request.is_primary == Some(false) && image.is_primary {
            return Err(GalleryError::Conflict(format!(
                "image {image_id} is the primary image of vehicle {vehicle_id}; set another image as primary instead"
            )));
        }

        if let Some(target) = request.position {
            self.positions().move_to(vehicle_id, image_id, target)?;
        }
        if request.is_primary == Some(true) {
            if let Err(err) = self.primary().set_primary(vehicle_id, image_id) {
                if request.position.is_some() {
                    if let Err(undo) = self.positions().move_to(vehicle_id, image_id, image.position) {
                        error!(
                            "event=image_update module=service status=error image_id={image_id} step=undo_move error={undo}"
                        );
                    }
                }
                return Err(err);
            }
        }

        debug!(
            "event=image_update module=service status=ok vehicle_id={vehicle_id} image_id={image_id}"
        );
        self.get_image(image_id)
    }

    /// Removes one image with its files, closes the position gap and re-elects
    /// the primary image when needed.
    ///
    /// Files are removed only after the metadata changes succeed; a failed
    /// compaction or re-election puts the record and positions back.
    pub fn delete(&self, image_id: ImageId) -> GalleryResult<bool> {
        let vehicle_id = self.get_image(image_id)?.vehicle_id;
        let (elected, remaining) = {
            let lock = self.vehicle_lock(vehicle_id);
            let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);
            self.delete_locked(vehicle_id, image_id)?
        };
        if remaining == 0 {
            self.release_idle_lock(vehicle_id);
        }

        info!(
            "event=image_delete module=service status=ok vehicle_id={vehicle_id} image_id={image_id} reelected={}",
            elected.is_some()
        );
        Ok(true)
    }

    fn delete_locked(
        &self,
        vehicle_id: VehicleId,
        image_id: ImageId,
    ) -> GalleryResult<(Option<ImageId>, usize)> {
        let image = self.get_image(image_id)?;
        let remaining = self.store.count_by_vehicle(vehicle_id)?.saturating_sub(1);

        self.store.delete(image_id)?;
        let shift = match self.positions().remove_and_compact(vehicle_id, image.position) {
            Ok(shift) => shift,
            Err(err) => {
                self.restore_deleted(&image, &PositionShift::default());
                return Err(err);
            }
        };
        let elected = match self.primary().on_delete(vehicle_id, image.is_primary) {
            Ok(elected) => elected,
            Err(err) => {
                self.restore_deleted(&image, &shift);
                return Err(err);
            }
        };

        self.delete_image_files(&image);
        self.pending_queue().retain(|pending| *pending != image_id);
        Ok((elected, remaining))
    }

    fn restore_deleted(&self, image: &ImageRecord, shift: &PositionShift) {
        if !shift.is_empty() {
            if let Err(err) = self.positions().undo_shift(shift) {
                error!(
                    "event=delete_rollback module=service status=error vehicle_id={} image_id={} step=undo_shift error={err}",
                    image.vehicle_id, image.id
                );
            }
        }
        if let Err(err) = self.store.save(image) {
            error!(
                "event=delete_rollback module=service status=error vehicle_id={} image_id={} step=restore_record error={err}",
                image.vehicle_id, image.id
            );
        }
    }

    /// Applies a complete `image -> position` permutation and returns the new order.
    pub fn reorder(
        &self,
        vehicle_id: VehicleId,
        mapping: &HashMap<ImageId, u32>,
    ) -> GalleryResult<Vec<ImageRecord>> {
        let lock = self.vehicle_lock(vehicle_id);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        self.positions().reorder(vehicle_id, mapping)?;
        info!(
            "event=gallery_reorder module=service status=ok vehicle_id={vehicle_id} count={}",
            mapping.len()
        );
        Ok(self.store.find_by_vehicle_ordered(vehicle_id)?)
    }

    /// Makes one image the cover of its vehicle. Idempotent.
    pub fn set_primary(&self, image_id: ImageId) -> GalleryResult<ImageRecord> {
        let vehicle_id = self.get_image(image_id)?.vehicle_id;
        let lock = self.vehicle_lock(vehicle_id);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        self.primary().set_primary(vehicle_id, image_id)?;
        self.get_image(image_id)
    }

    /// Produces (or refreshes) the thumbnail of one image.
    pub fn generate_thumbnail(&self, image_id: ImageId) -> GalleryResult<ImageRecord> {
        let vehicle_id = self.get_image(image_id)?.vehicle_id;
        let lock = self.vehicle_lock(vehicle_id);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);
        let image = self.get_image(image_id)?;

        let updated = self.attach_thumbnail(&image)?;
        self.pending_queue().retain(|pending| *pending != image_id);
        Ok(updated)
    }

    fn attach_thumbnail(&self, image: &ImageRecord) -> GalleryResult<ImageRecord> {
        let thumbnail = self
            .processor
            .generate_thumbnail(Path::new(&image.path), self.config.thumbnail_size())
            .map_err(processor_failure)?;

        let mut updated = image.clone();
        updated.thumbnail_path = Some(thumbnail.to_string_lossy().replace('\\', "/"));
        Ok(self.store.save(&updated)?)
    }

    /// Generates every queued thumbnail that is still needed. Returns how many succeeded.
    ///
    /// Failed entries are logged and dropped from the queue.
    pub fn process_pending_thumbnails(&self) -> usize {
        let queued: Vec<ImageId> = self.pending_queue().drain(..).collect();
        let mut generated = 0;
        for image_id in queued {
            match self.get_image(image_id) {
                Ok(image) if self.processor.should_generate_thumbnail(Path::new(&image.path)) => {}
                Ok(_) | Err(GalleryError::NotFound(_)) => continue,
                Err(err) => {
                    warn!(
                        "event=thumbnail_generate module=service status=error image_id={image_id} error_code={} error={err}",
                        err.code()
                    );
                    continue;
                }
            }
            match self.generate_thumbnail(image_id) {
                Ok(_) => generated += 1,
                Err(GalleryError::NotFound(_)) => {}
                Err(err) => warn!(
                    "event=thumbnail_generate module=service status=error image_id={image_id} error_code={} error={err}",
                    err.code()
                ),
            }
        }
        debug!("event=thumbnail_batch module=service status=ok generated={generated}");
        generated
    }

    pub fn pending_thumbnail_count(&self) -> usize {
        self.pending_queue().len()
    }

    /// Generates thumbnails for stored images that lack one and exceed the
    /// thumbnail bounds.
    pub fn generate_missing_thumbnails(&self) -> GalleryResult<ThumbnailBackfill> {
        let mut report = ThumbnailBackfill::default();
        for image in self.images_without_thumbnails()? {
            if !self.processor.should_generate_thumbnail(Path::new(&image.path)) {
                report.skipped += 1;
                continue;
            }
            match self.generate_thumbnail(image.id) {
                Ok(_) => report.generated += 1,
                Err(err) => report.failed.push(ThumbnailFailure {
                    image_id: image.id,
                    error: err.to_string(),
                }),
            }
        }
        info!(
            "event=thumbnail_backfill module=service status=ok generated={} skipped={} failed={}",
            report.generated,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    /// Ordered gallery snapshot; never observes a half-applied edit.
    pub fn get_gallery(&self, vehicle_id: VehicleId) -> GalleryResult<Gallery> {
        let images = {
            let lock = self.vehicle_lock(vehicle_id);
            let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
            self.store.find_by_vehicle_ordered(vehicle_id)?
        };
        if images.is_empty() {
            self.release_idle_lock(vehicle_id);
        }

        let primary = images.iter().find(|image| image.is_primary).cloned();
        Ok(Gallery {
            vehicle_id,
            total: images.len(),
            images,
            primary,
        })
    }

    pub fn get_image(&self, image_id: ImageId) -> GalleryResult<ImageRecord> {
        self.store
            .find_by_id(image_id)?
            .ok_or(GalleryError::NotFound(NotFoundTarget::Image(image_id)))
    }

    pub fn get_statistics(&self) -> GalleryResult<GalleryStatistics> {
        let images = self.store.list_all()?;
        Ok(compute_statistics(
            &images,
            self.config.large_image_threshold_bytes,
        ))
    }

    /// Filtered, ordered page of images across every vehicle.
    pub fn find_images(&self, query: &ImageListQuery) -> GalleryResult<ImagePage> {
        Ok(self.store.list_images(query)?)
    }

    /// Images above `large_image_threshold_bytes`, largest first.
    pub fn large_images(&self) -> GalleryResult<Vec<ImageRecord>> {
        let query = ImageListQuery {
            min_file_size: Some(self.config.large_image_threshold_bytes.saturating_add(1)),
            order_by: ImageOrder::FileSize,
            direction: SortDirection::Desc,
            ..ImageListQuery::default()
        };
        Ok(self.store.list_images(&query)?.images)
    }

    /// Vehicles that have images but no primary one.
    pub fn vehicles_without_primary(&self) -> GalleryResult<Vec<VehicleId>> {
        let mut missing = Vec::new();
        for vehicle_id in self.store.vehicle_ids()? {
            if self.store.find_primary_by_vehicle(vehicle_id)?.is_none() {
                missing.push(vehicle_id);
            }
        }
        Ok(missing)
    }

    pub fn images_without_thumbnails(&self) -> GalleryResult<Vec<ImageRecord>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|image| !image.has_thumbnail())
            .collect())
    }

    /// Deletes every image whose vehicle is not in `existing_vehicle_ids`.
    pub fn cleanup_orphaned_images(
        &self,
        existing_vehicle_ids: &HashSet<VehicleId>,
    ) -> GalleryResult<usize> {
        let mut removed = 0;
        for vehicle_id in self.store.vehicle_ids()? {
            if existing_vehicle_ids.contains(&vehicle_id) {
                continue;
            }
            removed += self.delete_vehicle_gallery(vehicle_id)?;
        }
        info!("event=orphan_cleanup module=service status=ok removed={removed}");
        Ok(removed)
    }

    /// Removes a whole vehicle gallery, files included. Returns removed record count.
    pub fn delete_vehicle_gallery(&self, vehicle_id: VehicleId) -> GalleryResult<usize> {
        let removed = {
            let lock = self.vehicle_lock(vehicle_id);
            let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

            let images = self.store.find_by_vehicle(vehicle_id)?;
            let removed = self.store.delete_by_vehicle(vehicle_id)?;
            for image in &images {
                self.delete_image_files(image);
            }

            let ids: HashSet<ImageId> = images.iter().map(|image| image.id).collect();
            self.pending_queue().retain(|pending| !ids.contains(pending));
            removed
        };
        self.release_idle_lock(vehicle_id);
        debug!(
            "event=gallery_delete module=service status=ok vehicle_id={vehicle_id} removed={removed}"
        );
        Ok(removed)
    }

    /// Writes a re-encoded copy of one image and returns its path.
    pub fn optimize(&self, image_id: ImageId, quality: u8) -> GalleryResult<PathBuf> {
        if !(1..=100).contains(&quality) {
            return Err(ValidationError::InvalidQuality(quality).into());
        }
        let image = self.get_image(image_id)?;
        self.processor
            .optimize_image(Path::new(&image.path), quality)
            .map_err(processor_failure)
    }

    pub fn storage_statistics(&self) -> GalleryResult<StorageStatistics> {
        self.processor
            .get_storage_statistics()
            .map_err(|err| GalleryError::Storage(StorageFailure::File(err)))
    }

    fn delete_image_files(&self, image: &ImageRecord) {
        if !self.processor.delete_file(Path::new(&image.path)) {
            warn!(
                "event=file_delete module=service status=error image_id={} kind=original",
                image.id
            );
        }
        if let Some(thumbnail) = image.thumbnail_path.as_deref() {
            if !self.processor.delete_file(Path::new(thumbnail)) {
                warn!(
                    "event=file_delete module=service status=error image_id={} kind=thumbnail",
                    image.id
                );
            }
        }
    }

    fn vehicle_lock(&self, vehicle_id: VehicleId) -> VehicleLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(vehicle_id).or_default())
    }

    /// Drops the lock entry of a vehicle nobody else is holding.
    fn release_idle_lock(&self, vehicle_id: VehicleId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&vehicle_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&vehicle_id);
        }
    }

    /// Number of vehicles that currently have a lock entry.
    pub fn tracked_vehicle_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn pending_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<ImageId>> {
        self.pending_thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn positions(&self) -> PositionManager<'_, S> {
        PositionManager::new(&self.store, self.config.max_images_per_vehicle)
    }

    fn primary(&self) -> PrimarySelector<'_, S> {
        PrimarySelector::new(&self.store)
    }
}

struct NewImage<'a> {
    vehicle_id: VehicleId,
    filename: &'a str,
    path: &'a Path,
    size: u64,
    mime_type: &'a str,
    dimensions: Option<(u32, u32)>,
    position: Option<u32>,
    is_primary: bool,
}

fn processor_failure(err: ProcessorError) -> GalleryError {
    match err {
        ProcessorError::InvalidQuality(quality) => ValidationError::InvalidQuality(quality).into(),
        err @ ProcessorError::Storage { .. } => GalleryError::Storage(StorageFailure::File(err)),
        err @ ProcessorError::Processing { .. } => GalleryError::Processing(err),
    }
}
