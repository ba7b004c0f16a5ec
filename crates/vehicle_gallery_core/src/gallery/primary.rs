//! Primary image election.
//!
//! # Responsibility
//! - Keep exactly one primary image per non-empty gallery.
//!
//! # Invariants
//! - The flag only moves through `GalleryStore::set_primary_image`.
//! - Re-election picks the image at position 1.

use crate::error::{GalleryError, GalleryResult, NotFoundTarget};
use crate::model::image::{ImageId, VehicleId};
use crate::repo::image_repo::{GalleryStore, StoreError};
use log::info;

pub struct PrimarySelector<'s, S: GalleryStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GalleryStore + ?Sized> PrimarySelector<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Makes `image_id` the primary image. Returns `false` when it already was.
    pub fn set_primary(&self, vehicle_id: VehicleId, image_id: ImageId) -> GalleryResult<bool> {
        if let Some(current) = self.store.find_primary_by_vehicle(vehicle_id)? {
            if current.id == image_id {
                return Ok(false);
            }
        }
        self.store
            .set_primary_image(vehicle_id, image_id)
            .map_err(|err| match err {
                StoreError::NotFound(_) => GalleryError::NotFound(NotFoundTarget::ImageInVehicle {
                    vehicle_id,
                    image_id,
                }),
                other => other.into(),
            })?;
        Ok(true)
    }

    /// The next upload becomes primary when the gallery is still empty.
    pub fn on_first_upload(&self, vehicle_id: VehicleId) -> GalleryResult<bool> {
        Ok(self.store.count_by_vehicle(vehicle_id)? == 0)
    }

    /// Elects a replacement after the primary image was deleted.
    pub fn on_delete(
        &self,
        vehicle_id: VehicleId,
        deleted_was_primary: bool,
    ) -> GalleryResult<Option<ImageId>> {
        if !deleted_was_primary {
            return Ok(None);
        }
        self.elect_first(vehicle_id)
    }

    /// Elects position 1 when a non-empty gallery has no primary.
    pub fn ensure_primary(&self, vehicle_id: VehicleId) -> GalleryResult<Option<ImageId>> {
        if self.store.find_primary_by_vehicle(vehicle_id)?.is_some() {
            return Ok(None);
        }
        self.elect_first(vehicle_id)
    }

    fn elect_first(&self, vehicle_id: VehicleId) -> GalleryResult<Option<ImageId>> {
        let Some(first) = self
            .store
            .find_by_vehicle_ordered(vehicle_id)?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        self.store.set_primary_image(vehicle_id, first.id)?;
        info!(
            "event=primary_elect module=gallery status=ok vehicle_id={vehicle_id} image_id={} position={}",
            first.id, first.position
        );
        Ok(Some(first.id))
    }
}
