use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::projects::{find_project, project_not_found};
use crate::error::AppError;
use crate::models::{NewPhoto, Photo};

const PHOTO_COLUMNS: &str =
    "id, project_id, filename, original_name, caption, is_before_photo, upload_date";

#[instrument(skip(pool))]
pub async fn get_photos(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    project_id: i64,
) -> Result<Vec<Photo>, AppError> {
    info!("Listing project photos");
    if find_project(pool, owner_id, project_id).await?.is_none() {
        return Err(project_not_found());
    }

    let rows = sqlx::query_as::<_, Photo>(&format!(
        "SELECT {PHOTO_COLUMNS} FROM photos
         WHERE project_id = ?
         ORDER BY upload_date DESC, id DESC"
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn create_photo(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    project_id: i64,
    photo: &NewPhoto,
) -> Result<Photo, AppError> {
    info!("Adding photo to project");
    let mut tx = pool.begin().await?;

    if find_project(&mut *tx, owner_id, project_id).await?.is_none() {
        return Err(project_not_found());
    }

    let row = sqlx::query_as::<_, Photo>(&format!(
        "INSERT INTO photos (project_id, filename, original_name, caption, is_before_photo, upload_date)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {PHOTO_COLUMNS}"
    ))
    .bind(project_id)
    .bind(&photo.filename)
    .bind(&photo.original_name)
    .bind(&photo.caption)
    .bind(photo.is_before_photo)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}
