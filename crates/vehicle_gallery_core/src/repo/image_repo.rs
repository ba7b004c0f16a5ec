//! Gallery store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide keyed persistence for image metadata plus a per-vehicle ordered view.
//! - Offer the two compound primitives gallery bookkeeping relies on:
//!   `bulk_update_positions` and `set_primary_image`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `ImageRecord::validate()` before SQL mutations.
//! - Compound primitives are all-or-nothing.
//! - Storage-level uniqueness violations surface as `StoreError::Conflict`,
//!   never as raw driver errors.
//! - No gallery business rules live here (capacity, contiguity, elections).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::image::{
    now_epoch_ms, ImageId, ImageRecord, ImageValidationError, Orientation, VehicleId,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior,
};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const IMAGE_SELECT_SQL: &str = "SELECT
    id,
    vehicle_id,
    filename,
    path,
    thumbnail_path,
    position,
    is_primary,
    file_size,
    width,
    height,
    mime_type,
    uploaded_at,
    updated_at
FROM vehicle_images";

const REQUIRED_COLUMNS: [&str; 13] = [
    "id",
    "vehicle_id",
    "filename",
    "path",
    "thumbnail_path",
    "position",
    "is_primary",
    "file_size",
    "width",
    "height",
    "mime_type",
    "uploaded_at",
    "updated_at",
];

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from gallery store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Record failed entity validation before write.
    Validation(ImageValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target image does not exist (or does not belong to the given vehicle).
    NotFound(ImageId),
    /// Write would break a storage-level uniqueness rule.
    Conflict(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// A writer panicked while holding the store lock.
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "image not found: {id}"),
            Self::Conflict(message) => write!(f, "gallery store conflict: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "gallery store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "gallery store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "gallery store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted image data: {message}"),
            Self::LockPoisoned => write!(f, "gallery store lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageValidationError> for StoreError {
    fn from(value: ImageValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Sort key for `GalleryStore::list_images`. Missing sizes and dimensions sort as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageOrder {
    #[default]
    Position,
    UploadedAt,
    UpdatedAt,
    Filename,
    FileSize,
    Width,
    Height,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Filter, ordering and paging options for listing images.
///
/// Every `Some` filter must match. Size and dimension filters never match
/// records whose value is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageListQuery {
    pub vehicle_id: Option<VehicleId>,
    pub is_primary: Option<bool>,
    /// Inclusive `(first, last)` position range.
    pub position_range: Option<(u32, u32)>,
    pub has_thumbnail: Option<bool>,
    pub min_file_size: Option<u64>,
    pub max_file_size: Option<u64>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub orientation: Option<Orientation>,
    pub order_by: ImageOrder,
    pub direction: SortDirection,
    /// `None` returns every matching row after `offset`.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// One page of `list_images` results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImagePage {
    pub images: Vec<ImageRecord>,
    /// Matching rows before paging.
    pub total: usize,
}

/// Persistence interface for image metadata.
///
/// Implementations must be safe to share between threads; the gallery service
/// serializes writers per vehicle but readers may overlap.
pub trait GalleryStore: Send + Sync {
    /// Inserts or overwrites one record by id and returns the stored copy.
    ///
    /// `updated_at` is refreshed; `uploaded_at` is kept from the first insert.
    fn save(&self, record: &ImageRecord) -> StoreResult<ImageRecord>;
    /// Loads one record by id.
    fn find_by_id(&self, id: ImageId) -> StoreResult<Option<ImageRecord>>;
    /// Loads all records of one vehicle in unspecified order.
    fn find_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>>;
    /// Loads all records of one vehicle sorted by `position` ascending.
    fn find_by_vehicle_ordered(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>>;
    /// Loads the flagged primary record of one vehicle.
    fn find_primary_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Option<ImageRecord>>;
    /// Loads the record at one position of one vehicle.
    fn find_by_position(
        &self,
        vehicle_id: VehicleId,
        position: u32,
    ) -> StoreResult<Option<ImageRecord>>;
    /// Loads the record with one filename within one vehicle.
    fn find_by_filename(
        &self,
        vehicle_id: VehicleId,
        filename: &str,
    ) -> StoreResult<Option<ImageRecord>>;
    /// Counts records of one vehicle.
    fn count_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize>;
    /// Deletes one record. Returns `NotFound` when absent.
    fn delete(&self, id: ImageId) -> StoreResult<()>;
    /// Deletes all records of one vehicle and returns how many were removed.
    fn delete_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize>;
    /// Rewrites positions for every listed id atomically.
    ///
    /// Unknown ids or colliding results leave every record untouched.
    fn bulk_update_positions(&self, updates: &[(ImageId, u32)]) -> StoreResult<()>;
    /// Clears the primary flag on every other image of the vehicle and sets it
    /// on `image_id`, atomically.
    fn set_primary_image(&self, vehicle_id: VehicleId, image_id: ImageId) -> StoreResult<()>;
    /// Loads every record of every vehicle.
    fn list_all(&self) -> StoreResult<Vec<ImageRecord>>;
    /// Filtered, ordered page of images; ties are broken by id.
    fn list_images(&self, query: &ImageListQuery) -> StoreResult<ImagePage>;
    /// Returns every vehicle id owning at least one record, sorted.
    fn vehicle_ids(&self) -> StoreResult<Vec<VehicleId>>;
}

/// SQLite-backed gallery store.
///
/// Owns its connection; the mutex makes the store shareable across threads
/// while SQLite itself only ever sees one statement at a time.
pub struct SqliteGalleryStore {
    conn: Mutex<Connection>,
}

impl SqliteGalleryStore {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_gallery_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl GalleryStore for SqliteGalleryStore {
    fn save(&self, record: &ImageRecord) -> StoreResult<ImageRecord> {
        record.validate()?;

        let conn = self.lock()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let existing = load_image(&tx, record.id)?;
        if let Some(existing) = existing.as_ref() {
            if existing.vehicle_id != record.vehicle_id {
                return Err(StoreError::Conflict(format!(
                    "image {} belongs to vehicle {}; vehicle_id is immutable",
                    record.id, existing.vehicle_id
                )));
            }
        }

        let mut stored = record.clone();
        stored.uploaded_at = existing
            .map(|existing| existing.uploaded_at)
            .unwrap_or(record.uploaded_at);
        stored.updated_at = now_epoch_ms();

        tx.execute(
            "INSERT INTO vehicle_images (
                id,
                vehicle_id,
                filename,
                path,
                thumbnail_path,
                position,
                is_primary,
                file_size,
                width,
                height,
                mime_type,
                uploaded_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                path = excluded.path,
                thumbnail_path = excluded.thumbnail_path,
                position = excluded.position,
                is_primary = excluded.is_primary,
                file_size = excluded.file_size,
                width = excluded.width,
                height = excluded.height,
                mime_type = excluded.mime_type,
                updated_at = excluded.updated_at;",
            params![
                stored.id.to_string(),
                stored.vehicle_id.to_string(),
                stored.filename.as_str(),
                stored.path.as_str(),
                stored.thumbnail_path.as_deref(),
                i64::from(stored.position),
                bool_to_int(stored.is_primary),
                stored.file_size.map(|size| size as i64),
                stored.width.map(i64::from),
                stored.height.map(i64::from),
                stored.mime_type.as_deref(),
                stored.uploaded_at,
                stored.updated_at,
            ],
        )?;
        tx.commit()?;

        Ok(stored)
    }

    fn find_by_id(&self, id: ImageId) -> StoreResult<Option<ImageRecord>> {
        let conn = self.lock()?;
        load_image(&conn, id)
    }

    fn find_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        let conn = self.lock()?;
        query_images(
            &conn,
            &format!("{IMAGE_SELECT_SQL} WHERE vehicle_id = ?1;"),
            &vehicle_id.to_string(),
        )
    }

    fn find_by_vehicle_ordered(&self, vehicle_id: VehicleId) -> StoreResult<Vec<ImageRecord>> {
        let conn = self.lock()?;
        query_images(
            &conn,
            &format!("{IMAGE_SELECT_SQL} WHERE vehicle_id = ?1 ORDER BY position ASC, id ASC;"),
            &vehicle_id.to_string(),
        )
    }

    fn find_primary_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<Option<ImageRecord>> {
        let conn = self.lock()?;
        let mut images = query_images(
            &conn,
            &format!(
                "{IMAGE_SELECT_SQL} WHERE vehicle_id = ?1 AND is_primary = 1 ORDER BY position ASC;"
            ),
            &vehicle_id.to_string(),
        )?;
        Ok(if images.is_empty() {
            None
        } else {
            Some(images.swap_remove(0))
        })
    }

    fn find_by_position(
        &self,
        vehicle_id: VehicleId,
        position: u32,
    ) -> StoreResult<Option<ImageRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{IMAGE_SELECT_SQL} WHERE vehicle_id = ?1 AND position = ?2;"
        ))?;
        let mut rows = stmt.query(params![vehicle_id.to_string(), i64::from(position)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_image_row(row)?));
        }
        Ok(None)
    }

    fn find_by_filename(
        &self,
        vehicle_id: VehicleId,
        filename: &str,
    ) -> StoreResult<Option<ImageRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{IMAGE_SELECT_SQL} WHERE vehicle_id = ?1 AND filename = ?2;"
        ))?;
        let mut rows = stmt.query(params![vehicle_id.to_string(), filename])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_image_row(row)?));
        }
        Ok(None)
    }

    fn count_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vehicle_images WHERE vehicle_id = ?1;",
            [vehicle_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn delete(&self, id: ImageId) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM vehicle_images WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn delete_by_vehicle(&self, vehicle_id: VehicleId) -> StoreResult<usize> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM vehicle_images WHERE vehicle_id = ?1;",
            [vehicle_id.to_string()],
        )?;
        Ok(changed)
    }

    fn bulk_update_positions(&self, updates: &[(ImageId, u32)]) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let conn = self.lock()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let now = now_epoch_ms();

        // Phase 1 parks every target on its negated slot so the unique
        // (vehicle_id, position) index never sees two rows on one position.
        for (id, position) in updates {
            let changed = tx.execute(
                "UPDATE vehicle_images
                 SET position = ?2,
                     updated_at = ?3
                 WHERE id = ?1;",
                params![id.to_string(), -i64::from(*position), now],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(*id));
            }
        }

        for (id, _) in updates {
            tx.execute(
                "UPDATE vehicle_images
                 SET position = -position
                 WHERE id = ?1
                   AND position < 0;",
                [id.to_string()],
            )?;
        }

        tx.commit()?;
        debug!(
            "event=positions_update module=repo status=ok count={}",
            updates.len()
        );
        Ok(())
    }

    fn set_primary_image(&self, vehicle_id: VehicleId, image_id: ImageId) -> StoreResult<()> {
        let conn = self.lock()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        let belongs: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM vehicle_images
                WHERE id = ?1
                  AND vehicle_id = ?2
            );",
            params![image_id.to_string(), vehicle_id.to_string()],
            |row| row.get(0),
        )?;
        if belongs != 1 {
            return Err(StoreError::NotFound(image_id));
        }

        let now = now_epoch_ms();
        tx.execute(
            "UPDATE vehicle_images
             SET is_primary = 0,
                 updated_at = ?3
             WHERE vehicle_id = ?1
               AND id <> ?2
               AND is_primary = 1;",
            params![vehicle_id.to_string(), image_id.to_string(), now],
        )?;
        tx.execute(
            "UPDATE vehicle_images
             SET is_primary = 1,
                 updated_at = ?2
             WHERE id = ?1
               AND is_primary = 0;",
            params![image_id.to_string(), now],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn list_all(&self) -> StoreResult<Vec<ImageRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{IMAGE_SELECT_SQL} ORDER BY vehicle_id ASC, position ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(parse_image_row(row)?);
        }
        Ok(images)
    }

    fn list_images(&self, query: &ImageListQuery) -> StoreResult<ImagePage> {
        let mut filter_sql = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(vehicle_id) = query.vehicle_id {
            filter_sql.push_str(" AND vehicle_id = ?");
            bind_values.push(Value::Text(vehicle_id.to_string()));
        }
        if let Some(is_primary) = query.is_primary {
            filter_sql.push_str(" AND is_primary = ?");
            bind_values.push(Value::Integer(bool_to_int(is_primary)));
        }
        if let Some((first, last)) = query.position_range {
            filter_sql.push_str(" AND position BETWEEN ? AND ?");
            bind_values.push(Value::Integer(i64::from(first)));
            bind_values.push(Value::Integer(i64::from(last)));
        }
        if let Some(has_thumbnail) = query.has_thumbnail {
            filter_sql.push_str(if has_thumbnail {
                " AND COALESCE(TRIM(thumbnail_path), '') <> ''"
            } else {
                " AND COALESCE(TRIM(thumbnail_path), '') = ''"
            });
        }
        if let Some(min) = query.min_file_size {
            filter_sql.push_str(" AND file_size >= ?");
            bind_values.push(Value::Integer(size_to_db(min)));
        }
        if let Some(max) = query.max_file_size {
            filter_sql.push_str(" AND file_size <= ?");
            bind_values.push(Value::Integer(size_to_db(max)));
        }
        if let Some(min_width) = query.min_width {
            filter_sql.push_str(" AND width >= ?");
            bind_values.push(Value::Integer(i64::from(min_width)));
        }
        if let Some(min_height) = query.min_height {
            filter_sql.push_str(" AND height >= ?");
            bind_values.push(Value::Integer(i64::from(min_height)));
        }
        if let Some(orientation) = query.orientation {
            filter_sql.push_str(" AND width > 0 AND height > 0");
            filter_sql.push_str(match orientation {
                Orientation::Landscape => " AND width > height",
                Orientation::Portrait => " AND width < height",
                Orientation::Square => " AND width = height",
            });
        }

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM vehicle_images{filter_sql};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let column = match query.order_by {
            ImageOrder::Position => "position",
            ImageOrder::UploadedAt => "uploaded_at",
            ImageOrder::UpdatedAt => "updated_at",
            ImageOrder::Filename => "filename",
            ImageOrder::FileSize => "COALESCE(file_size, 0)",
            ImageOrder::Width => "COALESCE(width, 0)",
            ImageOrder::Height => "COALESCE(height, 0)",
        };
        let direction = match query.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let mut sql = format!("{IMAGE_SELECT_SQL}{filter_sql} ORDER BY {column} {direction}, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(parse_image_row(row)?);
        }

        Ok(ImagePage {
            images,
            total: total as usize,
        })
    }

    fn vehicle_ids(&self) -> StoreResult<Vec<VehicleId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT vehicle_id
             FROM vehicle_images
             ORDER BY vehicle_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "vehicle_images.vehicle_id")?);
        }
        Ok(ids)
    }
}

fn load_image(conn: &Connection, id: ImageId) -> StoreResult<Option<ImageRecord>> {
    let mut stmt = conn.prepare(&format!("{IMAGE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_image_row(row)?));
    }
    Ok(None)
}

fn query_images(conn: &Connection, sql: &str, key: &str) -> StoreResult<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([key])?;
    let mut images = Vec::new();
    while let Some(row) = rows.next()? {
        images.push(parse_image_row(row)?);
    }
    Ok(images)
}

fn parse_image_row(row: &Row<'_>) -> StoreResult<ImageRecord> {
    let id_text: String = row.get("id")?;
    let vehicle_text: String = row.get("vehicle_id")?;

    let position = match row.get::<_, i64>("position")? {
        value if value >= 1 => value as u32,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid position `{other}` in vehicle_images.position"
            )));
        }
    };

    let is_primary = match row.get::<_, i64>("is_primary")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_primary value `{other}` in vehicle_images.is_primary"
            )));
        }
    };

    let image = ImageRecord {
        id: parse_uuid(&id_text, "vehicle_images.id")?,
        vehicle_id: parse_uuid(&vehicle_text, "vehicle_images.vehicle_id")?,
        filename: row.get("filename")?,
        path: row.get("path")?,
        thumbnail_path: row.get("thumbnail_path")?,
        position,
        is_primary,
        file_size: row
            .get::<_, Option<i64>>("file_size")?
            .map(|size| size as u64),
        width: row.get::<_, Option<i64>>("width")?.map(|w| w as u32),
        height: row.get::<_, Option<i64>>("height")?.map(|h| h as u32),
        mime_type: row.get("mime_type")?,
        uploaded_at: row.get("uploaded_at")?,
        updated_at: row.get("updated_at")?,
    };
    image.validate()?;
    Ok(image)
}

fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn size_to_db(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_gallery_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'vehicle_images'
        );",
        [],
        |row| row.get(0),
    )?;
    if table_exists != 1 {
        return Err(StoreError::MissingRequiredTable("vehicle_images"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(vehicle_images);")?;
    let mut rows = stmt.query([])?;
    let mut present = Vec::new();
    while let Some(row) = rows.next()? {
        present.push(row.get::<_, String>(1)?);
    }
    for column in REQUIRED_COLUMNS {
        if !present.iter().any(|name| name == column) {
            return Err(StoreError::MissingRequiredColumn {
                table: "vehicle_images",
                column,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{GalleryStore, SqliteGalleryStore, StoreError};
    use crate::db::open_db_in_memory;
    use crate::model::image::ImageRecord;
    use rusqlite::Connection;
    use uuid::Uuid;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteGalleryStore::try_new(conn).err().unwrap();
        assert!(matches!(
            err,
            StoreError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_position_maps_to_conflict() {
        let store = SqliteGalleryStore::try_new(open_db_in_memory().unwrap()).unwrap();
        let vehicle = Uuid::new_v4();
        store
            .save(&ImageRecord::new(vehicle, "a.jpg", "/u/a.jpg", 1))
            .unwrap();

        let err = store
            .save(&ImageRecord::new(vehicle, "b.jpg", "/u/b.jpg", 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
