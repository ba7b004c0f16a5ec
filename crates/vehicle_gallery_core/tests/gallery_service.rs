use image::{DynamicImage, ImageFormat, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;
use vehicle_gallery_core::db::open_db_in_memory;
use vehicle_gallery_core::{
    ConfigError, FsImageProcessor, GalleryConfig, GalleryError, GalleryService, GalleryStore,
    ImageListQuery, ImageRecord, InMemoryGalleryStore, NotFoundTarget, SqliteGalleryStore,
    UpdateImageRequest, UploadRequest, ValidationError,
};

type MemoryService = GalleryService<InMemoryGalleryStore, FsImageProcessor>;

fn setup() -> (TempDir, MemoryService) {
    let dir = tempfile::tempdir().unwrap();
    let config = GalleryConfig::with_upload_root(dir.path());
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        config,
    );
    (dir, service)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn upload(service: &MemoryService, vehicle_id: Uuid, name: &str) -> ImageRecord {
    service
        .upload(UploadRequest::new(
            vehicle_id,
            name,
            png_bytes(40, 30),
            "image/png",
        ))
        .unwrap()
}

fn seed(service: &MemoryService, vehicle_id: Uuid, count: usize) -> Vec<ImageRecord> {
    (1..=count)
        .map(|index| upload(service, vehicle_id, &format!("img{index}.png")))
        .collect()
}

fn assert_gallery_invariants<S: GalleryStore>(store: &S, vehicle_id: Uuid) {
    let images = store.find_by_vehicle_ordered(vehicle_id).unwrap();
    let positions: Vec<u32> = images.iter().map(|image| image.position).collect();
    let expected: Vec<u32> = (1..=images.len() as u32).collect();
    assert_eq!(positions, expected, "positions must be contiguous");

    let primaries = images.iter().filter(|image| image.is_primary).count();
    if images.is_empty() {
        assert_eq!(primaries, 0);
    } else {
        assert_eq!(primaries, 1, "non-empty gallery needs exactly one primary");
    }
}

#[test]
fn first_upload_becomes_primary_at_position_one() {
    let (dir, service) = setup();
    let vehicle = Uuid::new_v4();

    let image = upload(&service, vehicle, "img1.png");

    assert_eq!(image.position, 1);
    assert!(image.is_primary);
    assert_eq!(image.width, Some(40));
    assert_eq!(image.height, Some(30));
    assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    let expected = dir
        .path()
        .join("vehicles")
        .join(vehicle.to_string())
        .join("img1.png");
    assert!(expected.is_file());
    assert_eq!(Path::new(&image.path), expected);
}

#[test]
fn later_uploads_append_without_taking_primary() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();

    let images = seed(&service, vehicle, 3);

    assert_eq!(
        images.iter().map(|image| image.position).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(!images[1].is_primary);
    assert!(!images[2].is_primary);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn upload_at_position_shifts_following_images() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 3);

    let inserted = service
        .upload(
            UploadRequest::new(vehicle, "inserted.png", png_bytes(10, 10), "image/png")
                .at_position(2),
        )
        .unwrap();

    let gallery = service.get_gallery(vehicle).unwrap();
    let order: Vec<Uuid> = gallery.images.iter().map(|image| image.id).collect();
    assert_eq!(order, vec![images[0].id, inserted.id, images[1].id, images[2].id]);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn upload_as_primary_replaces_previous_primary() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 2);

    let cover = service
        .upload(UploadRequest::new(vehicle, "cover.png", png_bytes(8, 8), "image/png").as_primary())
        .unwrap();

    assert!(cover.is_primary);
    assert!(!service.get_image(images[0].id).unwrap().is_primary);
    assert_eq!(service.get_gallery(vehicle).unwrap().primary.unwrap().id, cover.id);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn delete_compacts_positions_and_keeps_order() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 3);

    assert!(service.delete(images[1].id).unwrap());

    let gallery = service.get_gallery(vehicle).unwrap();
    let layout: Vec<(Uuid, u32)> = gallery
        .images
        .iter()
        .map(|image| (image.id, image.position))
        .collect();
    assert_eq!(layout, vec![(images[0].id, 1), (images[2].id, 2)]);
    assert!(!Path::new(&images[1].path).exists());
}

#[test]
fn deleting_primary_elects_position_one() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 3);
    service.set_primary(images[1].id).unwrap();
    service.delete(images[1].id).unwrap();
    let gallery = service.get_gallery(vehicle).unwrap();
    assert_eq!(gallery.primary.unwrap().id, images[0].id);

    service.delete(images[0].id).unwrap();
    let gallery = service.get_gallery(vehicle).unwrap();
    let primary = gallery.primary.unwrap();
    assert_eq!(primary.id, images[2].id);
    assert_eq!(primary.position, 1);
}

#[test]
fn deleting_last_image_leaves_empty_gallery() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let image = upload(&service, vehicle, "only.png");

    service.delete(image.id).unwrap();

    let gallery = service.get_gallery(vehicle).unwrap();
    assert_eq!(gallery.total, 0);
    assert!(gallery.primary.is_none());
    assert!(matches!(
        service.delete(image.id),
        Err(GalleryError::NotFound(NotFoundTarget::Image(id))) if id == image.id
    ));
}

#[test]
fn reorder_applies_exact_permutation() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 3);

    let mapping = HashMap::from([(images[0].id, 3), (images[1].id, 1), (images[2].id, 2)]);
    let ordered = service.reorder(vehicle, &mapping).unwrap();

    let layout: HashMap<Uuid, u32> = ordered
        .iter()
        .map(|image| (image.id, image.position))
        .collect();
    assert_eq!(layout, mapping);
    assert_eq!(ordered[0].id, images[1].id);
}

#[test]
fn invalid_reorder_changes_nothing() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 3);
    let before = service.get_gallery(vehicle).unwrap().images;

    let duplicated = HashMap::from([(images[0].id, 1), (images[1].id, 1), (images[2].id, 2)]);
    let missing = HashMap::from([(images[0].id, 2), (images[1].id, 1)]);
    for mapping in [duplicated, missing] {
        let err = service.reorder(vehicle, &mapping).unwrap_err();
        assert!(matches!(
            err,
            GalleryError::Validation(ValidationError::InvalidPermutation(_))
        ));
    }

    assert_eq!(service.get_gallery(vehicle).unwrap().images, before);
}

#[test]
fn set_primary_moves_flag_and_is_idempotent() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 2);

    let promoted = service.set_primary(images[1].id).unwrap();
    assert!(promoted.is_primary);
    assert!(!service.get_image(images[0].id).unwrap().is_primary);

    let again = service.set_primary(images[1].id).unwrap();
    assert_eq!(again.updated_at, promoted.updated_at);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn disallowed_extension_is_rejected_without_record() {
    let (dir, service) = setup();
    let vehicle = Uuid::new_v4();

    let err = service
        .upload(UploadRequest::new(vehicle, "photo.bmp", vec![1, 2, 3], "image/bmp"))
        .unwrap_err();

    assert!(matches!(
        err,
        GalleryError::Validation(ValidationError::UnsupportedExtension { ref extension, .. })
            if extension == ".bmp"
    ));
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 0);
    assert!(!dir.path().join("vehicles").exists());
}

#[test]
fn upload_beyond_capacity_reports_gallery_full() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    seed(&service, vehicle, 10);

    let err = service
        .upload(UploadRequest::new(vehicle, "img11.png", png_bytes(4, 4), "image/png"))
        .unwrap_err();

    assert!(matches!(
        err,
        GalleryError::Validation(ValidationError::GalleryFull { max: 10, .. })
    ));
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 10);
}

#[test]
fn upload_input_validation() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    upload(&service, vehicle, "taken.png");

    let cases = [
        (
            UploadRequest::new(vehicle, "../escape.png", png_bytes(2, 2), "image/png"),
            "invalid_filename",
        ),
        (
            UploadRequest::new(vehicle, "doc.png", png_bytes(2, 2), "application/pdf"),
            "mime",
        ),
        (UploadRequest::new(vehicle, "empty.png", Vec::new(), "image/png"), "empty"),
        (
            UploadRequest::new(vehicle, "taken.png", png_bytes(2, 2), "image/png"),
            "duplicate",
        ),
        (
            UploadRequest::new(vehicle, "far.png", png_bytes(2, 2), "image/png").at_position(5),
            "position",
        ),
    ];

    for (request, case) in cases {
        let err = service.upload(request).unwrap_err();
        let matched = match (&err, case) {
            (GalleryError::Validation(ValidationError::InvalidFilename(_)), "invalid_filename") => true,
            (GalleryError::Validation(ValidationError::UnsupportedMimeType(_)), "mime") => true,
            (GalleryError::Validation(ValidationError::EmptyFile), "empty") => true,
            (GalleryError::Validation(ValidationError::DuplicateFilename { .. }), "duplicate") => true,
            (
                GalleryError::Validation(ValidationError::PositionOutOfRange { max: 2, .. }),
                "position",
            ) => true,
            _ => false,
        };
        assert!(matched, "case {case}: unexpected error {err}");
    }
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 1);
}

#[test]
fn oversized_upload_is_rejected_before_saving() {
    let dir = tempfile::tempdir().unwrap();
    let config = GalleryConfig {
        max_file_size_bytes: 16,
        ..GalleryConfig::with_upload_root(dir.path())
    };
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        config,
    );

    let err = service
        .upload(UploadRequest::new(Uuid::new_v4(), "big.png", vec![0; 17], "image/png"))
        .unwrap_err();
    assert!(matches!(
        err,
        GalleryError::Validation(ValidationError::FileTooLarge { size: 17, max: 16 })
    ));
    assert!(!dir.path().join("vehicles").exists());
}

#[test]
fn update_moves_image_and_switches_primary() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 4);

    let updated = service
        .update(
            images[3].id,
            UpdateImageRequest {
                position: Some(1),
                is_primary: Some(true),
            },
        )
        .unwrap();

    assert_eq!(updated.position, 1);
    assert!(updated.is_primary);
    let order: Vec<Uuid> = service
        .get_gallery(vehicle)
        .unwrap()
        .images
        .iter()
        .map(|image| image.id)
        .collect();
    assert_eq!(order, vec![images[3].id, images[0].id, images[1].id, images[2].id]);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn update_rejects_unsetting_primary_and_bad_position() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 2);

    let err = service
        .update(
            images[0].id,
            UpdateImageRequest {
                position: Some(2),
                is_primary: Some(false),
            },
        )
        .unwrap_err();
    assert!(matches!(err, GalleryError::Conflict(_)));
    assert_eq!(service.get_image(images[0].id).unwrap().position, 1);

    let err = service
        .update(
            images[1].id,
            UpdateImageRequest {
                position: Some(3),
                is_primary: None,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        GalleryError::Validation(ValidationError::PositionOutOfRange { position: 3, .. })
    ));

    let unchanged = service
        .update(
            images[1].id,
            UpdateImageRequest {
                position: None,
                is_primary: Some(false),
            },
        )
        .unwrap();
    assert!(!unchanged.is_primary);
    assert_gallery_invariants(service.store(), vehicle);
}

#[test]
fn cleanup_removes_only_unknown_vehicles() {
    let (_dir, service) = setup();
    let kept = Uuid::new_v4();
    let orphan = Uuid::new_v4();
    seed(&service, kept, 2);
    let orphaned = seed(&service, orphan, 3);

    let removed = service
        .cleanup_orphaned_images(&HashSet::from([kept]))
        .unwrap();

    assert_eq!(removed, 3);
    assert_eq!(service.get_gallery(kept).unwrap().total, 2);
    assert_eq!(service.get_gallery(orphan).unwrap().total, 0);
    assert!(!Path::new(&orphaned[0].path).exists());
}

#[test]
fn statistics_reflect_stored_images() {
    let (_dir, service) = setup();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    seed(&service, first, 2);
    seed(&service, second, 1);

    let stats = service.get_statistics().unwrap();

    assert_eq!(stats.total_images, 3);
    assert_eq!(stats.vehicles_with_images, 2);
    assert_eq!(stats.vehicles_without_primary, 0);
    assert_eq!(stats.images_without_thumbnails, 3);
    assert_eq!(stats.images_by_format[".png"], 3);
    assert_eq!(stats.images_by_orientation["landscape"], 3);
    assert_eq!(stats.size_distribution["< 1MB"], 3);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["total_images"], 3);
}

#[test]
fn large_images_are_strictly_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let threshold = png_bytes(40, 30).len() as u64;
    let config = GalleryConfig {
        large_image_threshold_bytes: threshold,
        ..GalleryConfig::with_upload_root(dir.path())
    };
    let service = GalleryService::new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        config,
    );
    let vehicle = Uuid::new_v4();
    let at_threshold = upload(&service, vehicle, "small.png");
    let medium = service
        .upload(UploadRequest::new(vehicle, "medium.png", png_bytes(120, 90), "image/png"))
        .unwrap();
    let largest = service
        .upload(UploadRequest::new(vehicle, "large.png", png_bytes(400, 300), "image/png"))
        .unwrap();
    assert_eq!(at_threshold.file_size, Some(threshold));

    let large: Vec<Uuid> = service
        .large_images()
        .unwrap()
        .iter()
        .map(|image| image.id)
        .collect();

    assert_eq!(large, vec![largest.id, medium.id]);
    assert_eq!(service.get_statistics().unwrap().large_images_count, 2);
}

#[test]
fn find_images_pages_one_vehicle() {
    let (_dir, service) = setup();
    let vehicle = Uuid::new_v4();
    let images = seed(&service, vehicle, 5);
    seed(&service, Uuid::new_v4(), 2);

    let page = service
        .find_images(&ImageListQuery {
            vehicle_id: Some(vehicle),
            limit: Some(2),
            offset: 2,
            ..ImageListQuery::default()
        })
        .unwrap();

    assert_eq!(page.total, 5);
    let ids: Vec<Uuid> = page.images.iter().map(|image| image.id).collect();
    assert_eq!(ids, vec![images[2].id, images[3].id]);
}

#[test]
fn vehicles_without_primary_lists_only_broken_galleries() {
    let (_dir, service) = setup();
    let healthy = Uuid::new_v4();
    let broken = Uuid::new_v4();
    seed(&service, healthy, 2);
    service
        .store()
        .save(&ImageRecord::new(broken, "side.jpg", "/uploads/side.jpg", 1))
        .unwrap();

    assert_eq!(service.vehicles_without_primary().unwrap(), vec![broken]);
    assert_eq!(service.get_statistics().unwrap().vehicles_without_primary, 1);
}

#[test]
fn vehicle_locks_are_released_once_galleries_empty() {
    let (_dir, service) = setup();
    let removed = Uuid::new_v4();
    let emptied = Uuid::new_v4();
    seed(&service, removed, 2);
    let only = upload(&service, emptied, "only.png");
    assert_eq!(service.tracked_vehicle_locks(), 2);

    service.get_gallery(Uuid::new_v4()).unwrap();
    assert_eq!(service.tracked_vehicle_locks(), 2);

    assert_eq!(service.delete_vehicle_gallery(removed).unwrap(), 2);
    assert_eq!(service.tracked_vehicle_locks(), 1);

    service.delete(only.id).unwrap();
    assert_eq!(service.tracked_vehicle_locks(), 0);

    upload(&service, emptied, "again.png");
    assert_eq!(service.tracked_vehicle_locks(), 1);
    assert_gallery_invariants(service.store(), emptied);
}

#[test]
fn try_new_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = GalleryConfig {
        max_images_per_vehicle: 100,
        ..GalleryConfig::with_upload_root(dir.path())
    };

    let result = GalleryService::try_new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        config,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("max_images_per_vehicle")));

    assert!(GalleryService::try_new(
        InMemoryGalleryStore::new(),
        FsImageProcessor::new(dir.path()),
        GalleryConfig::with_upload_root(dir.path()),
    )
    .is_ok());
}

#[test]
fn sqlite_backed_service_keeps_invariants() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteGalleryStore::try_new(open_db_in_memory().unwrap()).unwrap();
    let service = GalleryService::new(
        store,
        FsImageProcessor::new(dir.path()),
        GalleryConfig::with_upload_root(dir.path()),
    );
    let vehicle = Uuid::new_v4();

    let mut ids = Vec::new();
    for index in 1..=4 {
        let image = service
            .upload(UploadRequest::new(
                vehicle,
                format!("img{index}.png"),
                png_bytes(12, 12),
                "image/png",
            ))
            .unwrap();
        ids.push(image.id);
    }
    service
        .upload(UploadRequest::new(vehicle, "front.png", png_bytes(12, 12), "image/png").at_position(1))
        .unwrap();
    service.delete(ids[0]).unwrap();
    let mapping: HashMap<Uuid, u32> = service
        .get_gallery(vehicle)
        .unwrap()
        .images
        .iter()
        .rev()
        .enumerate()
        .map(|(index, image)| (image.id, index as u32 + 1))
        .collect();
    service.reorder(vehicle, &mapping).unwrap();

    assert_gallery_invariants(service.store(), vehicle);
    assert_eq!(service.get_gallery(vehicle).unwrap().total, 4);
}
