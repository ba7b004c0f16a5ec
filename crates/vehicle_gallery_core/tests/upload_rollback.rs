use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use vehicle_gallery_core::media::processor::ProcessorResult;
use vehicle_gallery_core::{
    FsImageProcessor, GalleryConfig, GalleryError, GalleryService, GalleryStore, ImageId,
    ImageListQuery, ImagePage, ImageProcessor, ImageRecord, InMemoryGalleryStore, ProcessorError,
    StorageFailure, StorageStatistics, StoreError, StoreResult, ThumbnailMode, UploadRequest,
    VehicleId,
};

/// Store double that can be told to fail selected writes.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryGalleryStore,
    fail_save: AtomicBool,
    fail_set_primary: AtomicBool,
    fail_bulk_update: AtomicBool,
}

fn injected() -> StoreError {
    StoreError::InvalidData("injected failure".into())
}

impl GalleryStore for FlakyStore {
    fn save(&self, record: &ImageRecord) -> StoreResult<ImageRecord> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.save(record)
    }

    fn find_by_id(&self, id: ImageId) -> StoreResult<Option<ImageRecord>> {
        self.inner.find_by_id(id)
    }

    fn find_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        self.inner.find_by_vehicle(vehicle_id)
    }

    fn find_by_vehicle_ordered(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        self.inner.find_by_vehicle_ordered(vehicle_id)
    }

    fn find_primary_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Option<ImageRecord>> {
        self.inner.find_primary_by_vehicle(vehicle_id)
    }

    fn find_by_position(
        &self,
        vehicle_id: VehicleId,
        position: u32,
    ) -> StoreResult<Option<ImageRecord>> {
        self.inner.find_by_position(vehicle_id, position)
    }

    fn find_by_filename(
        &self,
        vehicle_id: VehicleId,
        filename: &str,
    ) -> StoreResult<Option<ImageRecord>> {
        self.inner.find_by_filename(vehicle_id, filename)
    }

    fn count_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        self.inner.count_by_vehicle(vehicle_id)
    }

    fn delete(&self, id: ImageId) -> StoreResult<()> {
        self.inner.delete(id)
    }

    fn delete_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        self.inner.delete_by_vehicle(vehicle_id)
    }

    fn bulk_update_positions(&self, updates: &[(ImageId, u32)]) -> StoreResult<()> {
        if self.fail_bulk_update.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.bulk_update_positions(updates)
    }

    fn set_primary_image(&self, vehicle_id: VehicleId, image_id: ImageId) -> StoreResult<()> {
        if self.fail_set_primary.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set_primary_image(vehicle_id, image_id)
    }

    fn list_all(&self) -> StoreResult<Vec<ImageRecord>> {
        self.inner.list_all()
    }

    fn list_images(&self, query: &ImageListQuery) -> StoreResult<ImagePage> {
        self.inner.list_images(query)
    }

    fn vehicle_ids(&self) -> StoreResult<Vec<VehicleId>> {
        self.inner.vehicle_ids()
    }
}

/// Processor double whose file writes always fail.
struct ReadOnlyDisk;

impl ImageProcessor for ReadOnlyDisk {
    fn validate_image_format(&self, _path: &Path) -> bool {
        true
    }

    fn get_image_dimensions(&self, _path: &Path) -> Option<(u32, u32)> {
        None
    }

    fn save_file(&self, _bytes: &[u8], path: &Path) -> ProcessorResult<PathBuf> {
        Err(ProcessorError::Storage {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn read_file(&self, path: &Path) -> ProcessorResult<Vec<u8>> {
        Err(ProcessorError::Storage {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }

    fn delete_file(&self, _path: &Path) -> bool {
        false
    }

    fn generate_thumbnail(&self, path: &Path, _size: (u32, u32)) -> ProcessorResult<PathBuf> {
        Err(ProcessorError::Processing {
            path: path.to_path_buf(),
            message: "read-only".into(),
        })
    }

    fn should_generate_thumbnail(&self, _path: &Path) -> bool {
        false
    }

    fn optimize_image(&self, path: &Path, _quality: u8) -> ProcessorResult<PathBuf> {
        Err(ProcessorError::Processing {
            path: path.to_path_buf(),
            message: "read-only".into(),
        })
    }

    fn get_storage_statistics(&self) -> ProcessorResult<StorageStatistics> {
        Ok(StorageStatistics::default())
    }
}

/// Real disk, but every thumbnail is wanted and every attempt fails.
struct FailingThumbnails(FsImageProcessor);

impl ImageProcessor for FailingThumbnails {
    fn validate_image_format(&self, path: &Path) -> bool {
        self.0.validate_image_format(path)
    }

    fn get_image_dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        self.0.get_image_dimensions(path)
    }

    fn save_file(&self, bytes: &[u8], path: &Path) -> ProcessorResult<PathBuf> {
        self.0.save_file(bytes, path)
    }

    fn read_file(&self, path: &Path) -> ProcessorResult<Vec<u8>> {
        self.0.read_file(path)
    }

    fn delete_file(&self, path: &Path) -> bool {
        self.0.delete_file(path)
    }

    fn generate_thumbnail(&self, path: &Path, _size: (u32, u32)) -> ProcessorResult<PathBuf> {
        Err(ProcessorError::Processing {
            path: path.to_path_buf(),
            message: "encoder unavailable".into(),
        })
    }

    fn should_generate_thumbnail(&self, _path: &Path) -> bool {
        true
    }

    fn optimize_image(&self, path: &Path, quality: u8) -> ProcessorResult<PathBuf> {
        self.0.optimize_image(path, quality)
    }

    fn get_storage_statistics(&self) -> ProcessorResult<StorageStatistics> {
        self.0.get_storage_statistics()
    }
}

fn request(vehicle_id: Uuid, name: &str) -> UploadRequest {
    // Content is never decoded on these paths.
    UploadRequest::new(vehicle_id, name, vec![0x89, b'P', b'N', b'G'], "image/png")
}

fn flaky_service(
    dir: &tempfile::TempDir,
) -> GalleryService<FlakyStore, FsImageProcessor> {
    GalleryService::new(
        FlakyStore::default(),
        FsImageProcessor::new(dir.path()),
        GalleryConfig::with_upload_root(dir.path()),
    )
}

#[test]
fn file_save_failure_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        ReadOnlyDisk,
        GalleryConfig::with_upload_root(dir.path()),
    );
    let vehicle = Uuid::new_v4();

    let err = service.upload(request(vehicle, "front.png")).unwrap_err();

    assert!(matches!(
        err,
        GalleryError::Storage(StorageFailure::File(ProcessorError::Storage { .. }))
    ));
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 0);
}

#[test]
fn metadata_failure_removes_saved_file_and_undoes_shift() {
    let dir = tempfile::tempdir().unwrap();
    let service = flaky_service(&dir);
    let vehicle = Uuid::new_v4();
    let first = service.upload(request(vehicle, "a.png")).unwrap();
    let second = service.upload(request(vehicle, "b.png")).unwrap();

    service.store().fail_save.store(true, Ordering::SeqCst);
    let err = service
        .upload(request(vehicle, "c.png").at_position(1))
        .unwrap_err();
    service.store().fail_save.store(false, Ordering::SeqCst);

    assert!(matches!(err, GalleryError::Storage(StorageFailure::Store(_))));
    let gallery = service.get_gallery(vehicle).unwrap();
    let layout: Vec<(Uuid, u32)> = gallery
        .images
        .iter()
        .map(|image| (image.id, image.position))
        .collect();
    assert_eq!(layout, vec![(first.id, 1), (second.id, 2)]);
    assert!(!service
        .config()
        .image_path(vehicle, "c.png")
        .exists());
}

#[test]
fn primary_election_failure_rolls_back_record() {
    let dir = tempfile::tempdir().unwrap();
    let service = flaky_service(&dir);
    let vehicle = Uuid::new_v4();

    service.store().fail_set_primary.store(true, Ordering::SeqCst);
    let err = service.upload(request(vehicle, "first.png")).unwrap_err();
    service.store().fail_set_primary.store(false, Ordering::SeqCst);

    assert!(matches!(err, GalleryError::Storage(_)));
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 0);
    assert!(!service
        .config()
        .image_path(vehicle, "first.png")
        .exists());

    let retried = service.upload(request(vehicle, "first.png")).unwrap();
    assert!(retried.is_primary);
    assert_eq!(retried.position, 1);
}

#[test]
fn thumbnail_failure_does_not_fail_inline_upload() {
    let dir = tempfile::tempdir().unwrap();
    let config = GalleryConfig {
        thumbnail_mode: ThumbnailMode::Inline,
        ..GalleryConfig::with_upload_root(dir.path())
    };
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        FailingThumbnails(FsImageProcessor::new(dir.path())),
        config,
    );

    let image = service
        .upload(request(Uuid::new_v4(), "front.png"))
        .unwrap();

    assert!(image.thumbnail_path.is_none());
    assert!(image.is_primary);
    assert!(Path::new(&image.path).exists());
    assert_eq!(service.pending_thumbnail_count(), 0);
}

#[test]
fn undecodable_upload_is_kept_without_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let config = GalleryConfig {
        thumbnail_mode: ThumbnailMode::Inline,
        ..GalleryConfig::with_upload_root(dir.path())
    };
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        config,
    );

    // Bytes are not a decodable PNG, so no thumbnail is attempted.
    let image = service
        .upload(request(Uuid::new_v4(), "broken.png"))
        .unwrap();

    assert!(image.thumbnail_path.is_none());
    assert_eq!(service.pending_thumbnail_count(), 0);
    assert_eq!(service.images_without_thumbnails().unwrap().len(), 1);
}

#[test]
fn failed_reelection_keeps_deleted_primary_and_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let service = flaky_service(&dir);
    let vehicle = Uuid::new_v4();
    let first = service.upload(request(vehicle, "a.png")).unwrap();
    let second = service.upload(request(vehicle, "b.png")).unwrap();
    assert!(first.is_primary);

    service.store().fail_set_primary.store(true, Ordering::SeqCst);
    let err = service.delete(first.id).unwrap_err();
    service.store().fail_set_primary.store(false, Ordering::SeqCst);

    assert!(matches!(err, GalleryError::Storage(StorageFailure::Store(_))));
    let gallery = service.get_gallery(vehicle).unwrap();
    let layout: Vec<(Uuid, u32, bool)> = gallery
        .images
        .iter()
        .map(|image| (image.id, image.position, image.is_primary))
        .collect();
    assert_eq!(layout, vec![(first.id, 1, true), (second.id, 2, false)]);
    assert!(Path::new(&first.path).exists());

    assert!(service.delete(first.id).unwrap());
    let gallery = service.get_gallery(vehicle).unwrap();
    assert_eq!(gallery.total, 1);
    assert_eq!(gallery.primary.map(|image| image.id), Some(second.id));
    assert_eq!(gallery.images[0].position, 1);
    assert!(!Path::new(&first.path).exists());
}

#[test]
fn failed_compaction_restores_deleted_image() {
    let dir = tempfile::tempdir().unwrap();
    let service = flaky_service(&dir);
    let vehicle = Uuid::new_v4();
    let first = service.upload(request(vehicle, "a.png")).unwrap();
    let middle = service.upload(request(vehicle, "b.png")).unwrap();
    let last = service.upload(request(vehicle, "c.png")).unwrap();

    service.store().fail_bulk_update.store(true, Ordering::SeqCst);
    let err = service.delete(middle.id).unwrap_err();
    service.store().fail_bulk_update.store(false, Ordering::SeqCst);

    assert!(matches!(err, GalleryError::Storage(StorageFailure::Store(_))));
    let restored = service.get_image(middle.id).unwrap();
    assert_eq!(restored.position, 2);
    assert_eq!(restored.filename, "b.png");
    assert!(Path::new(&middle.path).exists());

    let positions: Vec<(Uuid, u32)> = service
        .get_gallery(vehicle)
        .unwrap()
        .images
        .iter()
        .map(|image| (image.id, image.position))
        .collect();
    assert_eq!(positions, vec![(first.id, 1), (middle.id, 2), (last.id, 3)]);
}
