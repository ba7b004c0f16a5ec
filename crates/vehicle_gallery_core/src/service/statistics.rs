//! Gallery-wide statistics.

use crate::model::image::{round_2, ImageRecord, Orientation, VehicleId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Aggregate view over every stored image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GalleryStatistics {
    pub total_images: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub average_size_mb: f64,
    pub vehicles_with_images: usize,
    pub vehicles_without_primary: usize,
    pub images_without_thumbnails: usize,
    pub large_images_count: usize,
    /// Lower-case extension with dot -> count.
    pub images_by_format: BTreeMap<String, usize>,
    /// `landscape | portrait | square | unknown` -> count.
    pub images_by_orientation: BTreeMap<String, usize>,
    /// `< 1MB | 1-3MB | 3-5MB | > 5MB` -> count. Images without a known size are left out.
    pub size_distribution: BTreeMap<String, usize>,
}

/// Builds statistics from a snapshot of all records.
///
/// `large_threshold_bytes` decides `large_images_count` (strictly greater).
pub fn compute_statistics(images: &[ImageRecord], large_threshold_bytes: u64) -> GalleryStatistics {
    let mut stats = GalleryStatistics {
        total_images: images.len(),
        ..GalleryStatistics::default()
    };
    for bucket in ["< 1MB", "1-3MB", "3-5MB", "> 5MB"] {
        stats.size_distribution.insert(bucket.to_string(), 0);
    }

    let mut has_primary: HashMap<VehicleId, bool> = HashMap::new();
    for image in images {
        let flag = has_primary.entry(image.vehicle_id).or_insert(false);
        *flag |= image.is_primary;

        if !image.has_thumbnail() {
            stats.images_without_thumbnails += 1;
        }

        *stats.images_by_format.entry(image.extension()).or_insert(0) += 1;

        let orientation = match image.orientation() {
            Some(Orientation::Landscape) => "landscape",
            Some(Orientation::Portrait) => "portrait",
            Some(Orientation::Square) => "square",
            None => "unknown",
        };
        *stats
            .images_by_orientation
            .entry(orientation.to_string())
            .or_insert(0) += 1;

        let Some(size) = image.file_size else {
            continue;
        };
        stats.total_size_bytes += size;
        if size > large_threshold_bytes {
            stats.large_images_count += 1;
        }
        let bucket = if size < BYTES_PER_MB {
            "< 1MB"
        } else if size < 3 * BYTES_PER_MB {
            "1-3MB"
        } else if size < 5 * BYTES_PER_MB {
            "3-5MB"
        } else {
            "> 5MB"
        };
        *stats.size_distribution.entry(bucket.to_string()).or_insert(0) += 1;
    }

    stats.vehicles_with_images = has_primary.len();
    stats.vehicles_without_primary = has_primary.values().filter(|flag| !**flag).count();
    stats.total_size_mb = round_2(stats.total_size_bytes as f64 / BYTES_PER_MB as f64);
    if stats.total_images > 0 {
        stats.average_size_mb = round_2(
            stats.total_size_bytes as f64 / BYTES_PER_MB as f64 / stats.total_images as f64,
        );
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::compute_statistics;
    use crate::model::image::ImageRecord;
    use uuid::Uuid;

    fn image(vehicle: Uuid, name: &str, position: u32, size: u64) -> ImageRecord {
        let mut record = ImageRecord::new(vehicle, name, format!("/u/{name}"), position);
        record.file_size = Some(size);
        record
    }

    #[test]
    fn empty_snapshot_has_zeroed_buckets() {
        let stats = compute_statistics(&[], 5 * 1024 * 1024);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.average_size_mb, 0.0);
        assert_eq!(stats.size_distribution.len(), 4);
        assert!(stats.size_distribution.values().all(|count| *count == 0));
    }

    #[test]
    fn buckets_and_vehicle_counts() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut cover = image(first, "a.jpg", 1, 512 * 1024);
        cover.is_primary = true;
        cover.width = Some(1600);
        cover.height = Some(900);
        let images = vec![
            cover,
            image(first, "b.png", 2, 2 * 1024 * 1024),
            image(second, "c.webp", 1, 6 * 1024 * 1024),
        ];

        let stats = compute_statistics(&images, 5 * 1024 * 1024);
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.vehicles_with_images, 2);
        assert_eq!(stats.vehicles_without_primary, 1);
        assert_eq!(stats.large_images_count, 1);
        assert_eq!(stats.images_without_thumbnails, 3);
        assert_eq!(stats.size_distribution["< 1MB"], 1);
        assert_eq!(stats.size_distribution["1-3MB"], 1);
        assert_eq!(stats.size_distribution["> 5MB"], 1);
        assert_eq!(stats.images_by_format[".webp"], 1);
        assert_eq!(stats.images_by_orientation["landscape"], 1);
        assert_eq!(stats.images_by_orientation["unknown"], 2);
        assert_eq!(stats.total_size_mb, 8.5);
    }

    #[test]
    fn bucket_edges_belong_to_the_upper_bucket() {
        let vehicle = Uuid::new_v4();
        let images = vec![
            image(vehicle, "a.jpg", 1, 1024 * 1024),
            image(vehicle, "b.jpg", 2, 3 * 1024 * 1024),
            image(vehicle, "c.jpg", 3, 5 * 1024 * 1024),
            image(vehicle, "d.jpg", 4, 5 * 1024 * 1024 - 1),
        ];

        let stats = compute_statistics(&images, 5 * 1024 * 1024);
        assert_eq!(stats.size_distribution["< 1MB"], 0);
        assert_eq!(stats.size_distribution["1-3MB"], 1);
        assert_eq!(stats.size_distribution["3-5MB"], 2);
        assert_eq!(stats.size_distribution["> 5MB"], 1);
        assert_eq!(stats.large_images_count, 0);
    }
}
