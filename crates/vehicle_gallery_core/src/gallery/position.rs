//! Position bookkeeping for one vehicle gallery.
//!
//! # Responsibility
//! - Allocate, shift, compact and permute image positions.
//!
//! # Invariants
//! - After every completed operation the positions of a vehicle are exactly `1..=N`.
//! - Every rewrite goes through one `bulk_update_positions` call, so a failure
//!   leaves the previous layout intact.
//! - Callers hold the vehicle's write lock.

use crate::error::{GalleryError, GalleryResult, NotFoundTarget, ValidationError};
use crate::model::image::{ImageId, VehicleId};
use crate::repo::image_repo::GalleryStore;
use std::collections::{HashMap, HashSet};

/// Positions moved by `insert_at` or `remove_and_compact`, kept so a failed
/// upload or delete can put them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionShift {
    /// `(image, position before the shift)`.
    pub previous: Vec<(ImageId, u32)>,
}

impl PositionShift {
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

pub struct PositionManager<'s, S: GalleryStore + ?Sized> {
    store: &'s S,
    max_images: u32,
}

impl<'s, S: GalleryStore + ?Sized> PositionManager<'s, S> {
    pub fn new(store: &'s S, max_images: u32) -> Self {
        Self { store, max_images }
    }

    /// Slot for an appended image: `count + 1`.
    pub fn next_position(&self, vehicle_id: VehicleId) -> GalleryResult<u32> {
        let count = self.store.count_by_vehicle(vehicle_id)? as u32;
        if count >= self.max_images {
            return Err(ValidationError::GalleryFull {
                vehicle_id,
                max: self.max_images,
            }
            .into());
        }
        Ok(count + 1)
    }

    /// Frees `position` by moving every image at or after it one slot down.
    pub fn insert_at(&self, vehicle_id: VehicleId, position: u32) -> GalleryResult<PositionShift> {
        let images = self.store.find_by_vehicle_ordered(vehicle_id)?;
        let count = images.len() as u32;
        if count >= self.max_images {
            return Err(ValidationError::GalleryFull {
                vehicle_id,
                max: self.max_images,
            }
            .into());
        }
        if position < 1 || position > count + 1 {
            return Err(ValidationError::PositionOutOfRange {
                position,
                min: 1,
                max: count + 1,
            }
            .into());
        }

        let mut shift = PositionShift::default();
        let mut updates = Vec::new();
        for image in images.iter().rev().filter(|image| image.position >= position) {
            shift.previous.push((image.id, image.position));
            updates.push((image.id, image.position + 1));
        }
        self.store.bulk_update_positions(&updates)?;
        Ok(shift)
    }

    /// Reverts a shift produced by `insert_at` or `remove_and_compact`.
    pub fn undo_shift(&self, shift: &PositionShift) -> GalleryResult<()> {
        self.store.bulk_update_positions(&shift.previous)?;
        Ok(())
    }

    /// Closes the gap left at `removed_position`.
    pub fn remove_and_compact(
        &self,
        vehicle_id: VehicleId,
        removed_position: u32,
    ) -> GalleryResult<PositionShift> {
        let mut shift = PositionShift::default();
        let mut updates = Vec::new();
        for image in self
            .store
            .find_by_vehicle_ordered(vehicle_id)?
            .into_iter()
            .filter(|image| image.position > removed_position)
        {
            shift.previous.push((image.id, image.position));
            updates.push((image.id, image.position - 1));
        }
        self.store.bulk_update_positions(&updates)?;
        Ok(shift)
    }

    /// Applies a full `image -> position` permutation of the gallery.
    pub fn reorder(
        &self,
        vehicle_id: VehicleId,
        mapping: &HashMap<ImageId, u32>,
    ) -> GalleryResult<()> {
        let images = self.store.find_by_vehicle_ordered(vehicle_id)?;
        let current: Vec<ImageId> = images.iter().map(|image| image.id).collect();
        validate_permutation(&current, mapping)?;

        let updates: Vec<(ImageId, u32)> = images
            .iter()
            .filter_map(|image| {
                let target = mapping.get(&image.id).copied()?;
                (target != image.position).then_some((image.id, target))
            })
            .collect();
        self.store.bulk_update_positions(&updates)?;
        Ok(())
    }

    /// Moves one image to `target`, sliding the images in between by one.
    pub fn move_to(
        &self,
        vehicle_id: VehicleId,
        image_id: ImageId,
        target: u32,
    ) -> GalleryResult<()> {
        let mut images = self.store.find_by_vehicle_ordered(vehicle_id)?;
        let count = images.len() as u32;
        let index = images
            .iter()
            .position(|image| image.id == image_id)
            .ok_or(GalleryError::NotFound(NotFoundTarget::ImageInVehicle {
                vehicle_id,
                image_id,
            }))?;
        if target < 1 || target > count {
            return Err(ValidationError::PositionOutOfRange {
                position: target,
                min: 1,
                max: count,
            }
            .into());
        }
        if images[index].position == target {
            return Ok(());
        }

        let moved = images.remove(index);
        images.insert(target as usize - 1, moved);
        let updates: Vec<(ImageId, u32)> = images
            .iter()
            .enumerate()
            .filter_map(|(offset, image)| {
                let position = offset as u32 + 1;
                (image.position != position).then_some((image.id, position))
            })
            .collect();
        self.store.bulk_update_positions(&updates)?;
        Ok(())
    }
}

/// Checks that `mapping` assigns every id in `current` exactly one of `1..=N`.
pub fn validate_permutation(
    current: &[ImageId],
    mapping: &HashMap<ImageId, u32>,
) -> Result<(), ValidationError> {
    if mapping.len() != current.len() {
        return Err(ValidationError::InvalidPermutation(format!(
            "mapping has {} entries, gallery has {} images",
            mapping.len(),
            current.len()
        )));
    }

    let known: HashSet<&ImageId> = current.iter().collect();
    if let Some(unknown) = mapping.keys().find(|id| !known.contains(id)) {
        return Err(ValidationError::InvalidPermutation(format!(
            "image {unknown} is not part of the gallery"
        )));
    }

    let count = current.len() as u32;
    let mut seen = HashSet::with_capacity(mapping.len());
    for position in mapping.values() {
        if *position < 1 || *position > count {
            return Err(ValidationError::InvalidPermutation(format!(
                "position {position} is outside 1..={count}"
            )));
        }
        if !seen.insert(*position) {
            return Err(ValidationError::InvalidPermutation(format!(
                "position {position} is assigned twice"
            )));
        }
    }
    Ok(())
}
