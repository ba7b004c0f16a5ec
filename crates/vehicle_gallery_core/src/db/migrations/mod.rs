//! Gallery schema migrations.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps for `vehicle_images`.
//! - Bring a connection up to `latest_version()` inside one transaction.
//!
//! # Invariants
//! - Step versions are contiguous, starting at 1.
//! - `PRAGMA user_version` always equals the last applied step.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "vehicle_images",
        sql: include_str!("0001_vehicle_images.sql"),
    },
    SchemaStep {
        version: 2,
        name: "gallery_indexes",
        sql: include_str!("0002_gallery_indexes.sql"),
    },
];

/// Schema version this build writes and expects.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Runs every step above the connection's `user_version`.
///
/// Either all pending steps land or none do.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}
