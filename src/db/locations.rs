use chrono::Utc;
use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::{AppError, conflict_on_unique};
use crate::models::{
    DEFAULT_LOCATION_COLOR, DEFAULT_LOCATION_ICON, Location, LocationChanges, NewLocation,
};

const LOCATION_COLUMNS: &str = "id, owner_id, name, icon, color, created_at";

pub fn location_not_found() -> AppError {
    AppError::NotFound("Location not found".to_string())
}

#[instrument(skip(pool))]
pub async fn get_locations(pool: &Pool<Sqlite>, owner_id: i64) -> Result<Vec<Location>, AppError> {
    info!("Listing locations");
    let rows = sqlx::query_as::<_, Location>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations
         WHERE owner_id = ?
         ORDER BY created_at ASC, rowid ASC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Works on a pool or inside a transaction.
pub async fn find_location<'e, E>(
    executor: E,
    owner_id: i64,
    id: &str,
) -> Result<Option<Location>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Location>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations WHERE owner_id = ? AND id = ?"
    ))
    .bind(owner_id)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(pool))]
pub async fn get_location(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    id: &str,
) -> Result<Location, AppError> {
    info!("Fetching location");
    find_location(pool, owner_id, id)
        .await?
        .ok_or_else(location_not_found)
}

#[instrument(skip(pool))]
pub async fn create_location(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location: &NewLocation,
) -> Result<Location, AppError> {
    info!("Creating location");
    let row = sqlx::query_as::<_, Location>(&format!(
        "INSERT INTO locations (owner_id, id, name, icon, color, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {LOCATION_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(&location.id)
    .bind(&location.name)
    .bind(location.icon.as_deref().unwrap_or(DEFAULT_LOCATION_ICON))
    .bind(location.color.as_deref().unwrap_or(DEFAULT_LOCATION_COLOR))
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|err| conflict_on_unique(err, "Location ID already exists"))?;

    Ok(row)
}

/// Icon and color are only replaced when given.
#[instrument(skip(pool))]
pub async fn update_location(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    id: &str,
    changes: &LocationChanges,
) -> Result<Location, AppError> {
    info!("Updating location");
    let row = sqlx::query_as::<_, Location>(&format!(
        "UPDATE locations
         SET name = ?, icon = COALESCE(?, icon), color = COALESCE(?, color)
         WHERE owner_id = ? AND id = ?
         RETURNING {LOCATION_COLUMNS}"
    ))
    .bind(&changes.name)
    .bind(changes.icon.as_deref())
    .bind(changes.color.as_deref())
    .bind(owner_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(location_not_found)
}

/// Deletes the location and its categories in one transaction. Refused while
/// any of the owner's projects still points at it.
#[instrument(skip(pool))]
pub async fn delete_location(pool: &Pool<Sqlite>, owner_id: i64, id: &str) -> Result<(), AppError> {
    info!("Deleting location");
    let mut tx = pool.begin().await?;

    if find_location(&mut *tx, owner_id, id).await?.is_none() {
        return Err(location_not_found());
    }

    let project_count = super::project_count_for_location(&mut *tx, owner_id, id).await?;
    if project_count > 0 {
        return Err(AppError::in_use(
            "Cannot delete location that is being used by projects",
            project_count,
        ));
    }

    let swept = sqlx::query("DELETE FROM categories WHERE owner_id = ? AND location_id = ?")
        .bind(owner_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM locations WHERE owner_id = ? AND id = ?")
        .bind(owner_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(categories_removed = swept.rows_affected(), "Location deleted");
    Ok(())
}
