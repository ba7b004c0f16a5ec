//! Maintenance entry point for the vehicle gallery.
//!
//! # Responsibility
//! - Expose read-only reports and housekeeping jobs over an existing gallery
//!   database and upload root.
//! - Print machine-readable JSON on stdout; diagnostics go to stderr.

use clap::{Parser, Subcommand};
use log::info;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;
use vehicle_gallery_core::db::open_db;
use vehicle_gallery_core::{
    core_version, default_log_level, init_logging, FsImageProcessor, GalleryConfig,
    GalleryService, SqliteGalleryStore,
};

type CliService = GalleryService<SqliteGalleryStore, FsImageProcessor>;

#[derive(Parser)]
#[command(name = "vehicle-gallery")]
#[command(about = "Inspect and maintain vehicle image galleries")]
struct Cli {
    /// JSON file with gallery settings; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging stays off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the core library version.
    Version,
    /// Gallery-wide statistics plus a scan of the upload root.
    Stats {
        db: PathBuf,
        upload_root: PathBuf,
    },
    /// Ordered gallery of one vehicle.
    Gallery {
        db: PathBuf,
        upload_root: PathBuf,
        vehicle_id: Uuid,
    },
    /// Delete every gallery whose vehicle is not listed.
    Cleanup {
        db: PathBuf,
        upload_root: PathBuf,
        /// Vehicles that still exist.
        vehicle_ids: Vec<Uuid>,
    },
    /// Generate thumbnails for images that have none and exceed the thumbnail bounds.
    Thumbnails {
        db: PathBuf,
        upload_root: PathBuf,
    },
    /// Images above the configured large-image threshold, largest first.
    Large {
        db: PathBuf,
        upload_root: PathBuf,
    },
    /// Vehicles whose gallery has no primary image.
    MissingPrimary {
        db: PathBuf,
        upload_root: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value, Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(default_log_level(), log_dir)?;
    }
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Version => Ok(json!({ "version": core_version() })),
        Command::Stats { db, upload_root } => {
            let service = open_service(&db, &upload_root, config_path)?;
            Ok(json!({
                "gallery": service.get_statistics()?,
                "storage": service.storage_statistics()?,
            }))
        }
        Command::Gallery {
            db,
            upload_root,
            vehicle_id,
        } => {
            let service = open_service(&db, &upload_root, config_path)?;
            Ok(serde_json::to_value(service.get_gallery(vehicle_id)?)?)
        }
        Command::Cleanup {
            db,
            upload_root,
            vehicle_ids,
        } => {
            let service = open_service(&db, &upload_root, config_path)?;
            let existing: HashSet<Uuid> = vehicle_ids.into_iter().collect();
            let removed = service.cleanup_orphaned_images(&existing)?;
            info!("event=cli_cleanup module=cli status=ok removed={removed}");
            Ok(json!({ "removed": removed }))
        }
        Command::Thumbnails { db, upload_root } => {
            let service = open_service(&db, &upload_root, config_path)?;
            Ok(serde_json::to_value(service.generate_missing_thumbnails()?)?)
        }
        Command::Large { db, upload_root } => {
            let service = open_service(&db, &upload_root, config_path)?;
            let images = service.large_images()?;
            Ok(json!({
                "threshold_bytes": service.config().large_image_threshold_bytes,
                "count": images.len(),
                "images": images,
            }))
        }
        Command::MissingPrimary { db, upload_root } => {
            let service = open_service(&db, &upload_root, config_path)?;
            Ok(json!({ "vehicle_ids": service.vehicles_without_primary()? }))
        }
    }
}

fn open_service(
    db: &Path,
    upload_root: &Path,
    config_path: Option<&Path>,
) -> Result<CliService, Box<dyn Error>> {
    let mut config = match config_path {
        Some(path) => GalleryConfig::from_json_file(path)?,
        None => GalleryConfig::default(),
    };
    config.upload_root = upload_root.to_path_buf();

    let store = SqliteGalleryStore::try_new(open_db(db)?)?;
    let processor = FsImageProcessor::new(upload_root)
        .with_thumbnail_size(config.thumbnail_size());
    Ok(GalleryService::try_new(store, processor, config)?)
}
