#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod uploads;
pub mod validation;
#[cfg(test)]
mod test;

use rocket::data::{Limits, ToByteUnit};
use rocket::fs::FileServer;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::info;

use env::AppConfig;
use error::AppError;
use telemetry::TelemetryFairing;
use uploads::UploadStore;

/// Multipart bodies carry a caption and flags next to the file.
const FORM_OVERHEAD_MIB: u64 = 1;

/// Assembles the application around an already migrated pool.
pub async fn build_rocket(pool: SqlitePool, config: AppConfig) -> Result<Rocket<Build>, AppError> {
    info!("Starting renovation tracker");

    let uploads = UploadStore::new(config.upload_dir.clone());
    uploads.ensure_root().await?;

    let limits = Limits::default()
        .limit("file", config.max_upload_mib.mebibytes())
        .limit(
            "data-form",
            (config.max_upload_mib + FORM_OVERHEAD_MIB).mebibytes(),
        );
    let figment = rocket::Config::figment().merge(("limits", limits));

    let files = FileServer::from(uploads.root());

    Ok(rocket::custom(figment)
        .manage(pool)
        .manage(uploads)
        .manage(config)
        .mount("/api", api::routes())
        .mount("/uploads", files)
        .register("/", api::catchers())
        .attach(TelemetryFairing))
}
