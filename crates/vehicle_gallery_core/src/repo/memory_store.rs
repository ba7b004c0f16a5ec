//! In-memory gallery store.
//!
//! # Responsibility
//! - Provide a dependency-free `GalleryStore` for tests and embedded callers.
//! - Mirror the uniqueness rules the SQLite schema enforces.
//!
//! # Invariants
//! - The arena and the per-vehicle index are updated together under one lock.
//! - Every id in the index resolves in the arena and vice versa.

use super::image_repo::{
    GalleryStore, ImageListQuery, ImageOrder, ImagePage, SortDirection, StoreError, StoreResult,
};
use crate::model::image::{now_epoch_ms, ImageId, ImageRecord, VehicleId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Arena {
    images: HashMap<ImageId, ImageRecord>,
    by_vehicle: HashMap<VehicleId, Vec<ImageId>>,
}

impl Arena {
    fn vehicle_images(&self, vehicle_id: VehicleId) -> impl Iterator<Item = &ImageRecord> {
        self.by_vehicle
            .get(&vehicle_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.images.get(id))
    }

    fn check_unique(&self, candidate: &ImageRecord) -> StoreResult<()> {
        for other in self.vehicle_images(candidate.vehicle_id) {
            if other.id == candidate.id {
                continue;
            }
            if other.position == candidate.position {
                return Err(StoreError::Conflict(format!(
                    "position {} already taken by image {} in vehicle {}",
                    candidate.position, other.id, candidate.vehicle_id
                )));
            }
            if candidate.is_primary && other.is_primary {
                return Err(StoreError::Conflict(format!(
                    "vehicle {} already has primary image {}",
                    candidate.vehicle_id, other.id
                )));
            }
            if other.filename == candidate.filename {
                return Err(StoreError::Conflict(format!(
                    "filename `{}` already used by image {} in vehicle {}",
                    candidate.filename, other.id, candidate.vehicle_id
                )));
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: ImageId) -> Option<ImageRecord> {
        let removed = self.images.remove(&id)?;
        if let Some(ids) = self.by_vehicle.get_mut(&removed.vehicle_id) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.by_vehicle.remove(&removed.vehicle_id);
            }
        }
        Some(removed)
    }
}

fn matches_query(image: &ImageRecord, query: &ImageListQuery) -> bool {
    let at_least = |value: Option<u64>, min: Option<u64>| match min {
        Some(min) => value.is_some_and(|value| value >= min),
        None => true,
    };

    query.vehicle_id.map_or(true, |id| image.vehicle_id == id)
        && query.is_primary.map_or(true, |flag| image.is_primary == flag)
        && query
            .position_range
            .map_or(true, |(first, last)| (first..=last).contains(&image.position))
        && query
            .has_thumbnail
            .map_or(true, |flag| image.has_thumbnail() == flag)
        && at_least(image.file_size, query.min_file_size)
        && query
            .max_file_size
            .map_or(true, |max| image.file_size.is_some_and(|size| size <= max))
        && at_least(image.width.map(u64::from), query.min_width.map(u64::from))
        && at_least(image.height.map(u64::from), query.min_height.map(u64::from))
        && query
            .orientation
            .map_or(true, |orientation| image.orientation() == Some(orientation))
}

fn compare_by(order: ImageOrder, left: &ImageRecord, right: &ImageRecord) -> Ordering {
    match order {
        ImageOrder::Position => left.position.cmp(&right.position),
        ImageOrder::UploadedAt => left.uploaded_at.cmp(&right.uploaded_at),
        ImageOrder::UpdatedAt => left.updated_at.cmp(&right.updated_at),
        ImageOrder::Filename => left.filename.cmp(&right.filename),
        ImageOrder::FileSize => left.file_size.unwrap_or(0).cmp(&right.file_size.unwrap_or(0)),
        ImageOrder::Width => left.width.unwrap_or(0).cmp(&right.width.unwrap_or(0)),
        ImageOrder::Height => left.height.unwrap_or(0).cmp(&right.height.unwrap_or(0)),
    }
}

/// `GalleryStore` backed by a `HashMap` arena and a per-vehicle id index.
#[derive(Default)]
pub struct InMemoryGalleryStore {
    inner: RwLock<Arena>,
}

impl InMemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Arena>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Arena>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl GalleryStore for InMemoryGalleryStore {
    fn save(&self, record: &ImageRecord) -> StoreResult<ImageRecord> {
        record.validate()?;

        let mut arena = self.write()?;
        let mut stored = record.clone();
        if let Some(existing) = arena.images.get(&record.id) {
            if existing.vehicle_id != record.vehicle_id {
                return Err(StoreError::Conflict(format!(
                    "image {} belongs to vehicle {}; vehicle_id is immutable",
                    record.id, existing.vehicle_id
                )));
            }
            stored.uploaded_at = existing.uploaded_at;
        }
        arena.check_unique(&stored)?;
        stored.updated_at = now_epoch_ms();

        if arena.images.insert(stored.id, stored.clone()).is_none() {
            arena
                .by_vehicle
                .entry(stored.vehicle_id)
                .or_default()
                .push(stored.id);
        }
        Ok(stored)
    }

    fn find_by_id(&self, id: ImageId) -> StoreResult<Option<ImageRecord>> {
        Ok(self.read()?.images.get(&id).cloned())
    }

    fn find_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        Ok(self.read()?.vehicle_images(vehicle_id).cloned().collect())
    }

    fn find_by_vehicle_ordered(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        let mut images = self.find_by_vehicle(vehicle_id)?;
        images.sort_by_key(|image| (image.position, image.id));
        Ok(images)
    }

    fn find_primary_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Option<ImageRecord>> {
        Ok(self
            .read()?
            .vehicle_images(vehicle_id)
            .find(|image| image.is_primary)
            .cloned())
    }

    fn find_by_position(
        &self,
        vehicle_id: VehicleId,
        position: u32,
    ) -> StoreResult<Option<ImageRecord>> {
        Ok(self
            .read()?
            .vehicle_images(vehicle_id)
            .find(|image| image.position == position)
            .cloned())
    }

    fn find_by_filename(
        &self,
        vehicle_id: VehicleId,
        filename: &str,
    ) -> StoreResult<Option<ImageRecord>> {
        Ok(self
            .read()?
            .vehicle_images(vehicle_id)
            .find(|image| image.filename == filename)
            .cloned())
    }

    fn count_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        Ok(self
            .read()?
            .by_vehicle
            .get(&vehicle_id)
            .map_or(0, |ids| ids.len()))
    }

    fn delete(&self, id: ImageId) -> StoreResult<()> {
        self.write()?
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn delete_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        let mut arena = self.write()?;
        let ids = arena.by_vehicle.remove(&vehicle_id).unwrap_or_default();
        for id in &ids {
            arena.images.remove(id);
        }
        Ok(ids.len())
    }

    fn bulk_update_positions(&self, updates: &[(ImageId, u32)]) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut arena = self.write()?;
        let mut staged: HashMap<ImageId, u32> = HashMap::with_capacity(updates.len());
        let mut vehicles = HashSet::new();
        for (id, position) in updates {
            let image = arena.images.get(id).ok_or(StoreError::NotFound(*id))?;
            vehicles.insert(image.vehicle_id);
            staged.insert(*id, *position);
        }

        // Check the post-update layout before touching anything.
        for vehicle_id in vehicles {
            let mut seen = HashSet::new();
            for image in arena.vehicle_images(vehicle_id) {
                let position = staged.get(&image.id).copied().unwrap_or(image.position);
                if position < 1 {
                    return Err(StoreError::Conflict(format!(
                        "position {position} is not a valid slot"
                    )));
                }
                if !seen.insert(position) {
                    return Err(StoreError::Conflict(format!(
                        "position {position} would be taken twice in vehicle {vehicle_id}"
                    )));
                }
            }
        }

        let now = now_epoch_ms();
        for (id, position) in staged {
            if let Some(image) = arena.images.get_mut(&id) {
                image.position = position;
                image.updated_at = now;
            }
        }
        Ok(())
    }

    fn set_primary_image(&self, vehicle_id: VehicleId, image_id: ImageId) -> StoreResult<()> {
        let mut arena = self.write()?;
        let belongs = arena
            .images
            .get(&image_id)
            .is_some_and(|image| image.vehicle_id == vehicle_id);
        if !belongs {
            return Err(StoreError::NotFound(image_id));
        }

        let now = now_epoch_ms();
        let ids = arena.by_vehicle.get(&vehicle_id).cloned().unwrap_or_default();
        for id in ids {
            if let Some(image) = arena.images.get_mut(&id) {
                let should_be_primary = id == image_id;
                if image.is_primary != should_be_primary {
                    image.is_primary = should_be_primary;
                    image.updated_at = now;
                }
            }
        }
        Ok(())
    }

    fn list_all(&self) -> StoreResult<Vec<ImageRecord>> {
        let mut images: Vec<ImageRecord> = self.read()?.images.values().cloned().collect();
        images.sort_by_key(|image| (image.vehicle_id, image.position));
        Ok(images)
    }

    fn list_images(&self, query: &ImageListQuery) -> StoreResult<ImagePage> {
        let mut images: Vec<ImageRecord> = self
            .read()?
            .images
            .values()
            .filter(|image| matches_query(image, query))
            .cloned()
            .collect();
        images.sort_by(|left, right| {
            let ordering = compare_by(query.order_by, left, right);
            let ordering = match query.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then_with(|| left.id.cmp(&right.id))
        });

        let total = images.len();
        let page = images
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect();
        Ok(ImagePage {
            images: page,
            total,
        })
    }

    fn vehicle_ids(&self) -> StoreResult<Vec<VehicleId>> {
        let mut ids: Vec<VehicleId> = self.read()?.by_vehicle.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
