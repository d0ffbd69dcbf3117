use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::locations::{find_location, location_not_found};
use crate::error::{AppError, conflict_on_unique};
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, owner_id, location_id, name, created_at";
const DUPLICATE_CATEGORY: &str = "Category already exists for this location";

fn category_not_found() -> AppError {
    AppError::NotFound("Category not found".to_string())
}

async fn require_location(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
) -> Result<(), AppError> {
    match find_location(pool, owner_id, location_id).await? {
        Some(_) => Ok(()),
        None => Err(location_not_found()),
    }
}

#[instrument(skip(pool))]
pub async fn get_categories(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
) -> Result<Vec<Category>, AppError> {
    info!("Listing categories for location");
    require_location(pool, owner_id, location_id).await?;

    let rows = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories
         WHERE owner_id = ? AND location_id = ?
         ORDER BY name"
    ))
    .bind(owner_id)
    .bind(location_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn create_category(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
    name: &str,
) -> Result<Category, AppError> {
    info!("Creating category");
    require_location(pool, owner_id, location_id).await?;

    let row = sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (owner_id, location_id, name, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(location_id)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|err| conflict_on_unique(err, DUPLICATE_CATEGORY))?;

    Ok(row)
}

/// Renames the category. Projects keep whatever category string they had.
#[instrument(skip(pool))]
pub async fn update_category(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
    category_id: i64,
    name: &str,
) -> Result<Category, AppError> {
    info!("Updating category");
    require_location(pool, owner_id, location_id).await?;

    let row = sqlx::query_as::<_, Category>(&format!(
        "UPDATE categories SET name = ?
         WHERE id = ? AND owner_id = ? AND location_id = ?
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(name)
    .bind(category_id)
    .bind(owner_id)
    .bind(location_id)
    .fetch_optional(pool)
    .await
    .map_err(|err| conflict_on_unique(err, DUPLICATE_CATEGORY))?;

    row.ok_or_else(category_not_found)
}

/// Refused while any of the owner's projects uses the category name.
#[instrument(skip(pool))]
pub async fn delete_category(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
    category_id: i64,
) -> Result<(), AppError> {
    info!("Deleting category");
    let mut tx = pool.begin().await?;

    if find_location(&mut *tx, owner_id, location_id).await?.is_none() {
        return Err(location_not_found());
    }

    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories
         WHERE id = ? AND owner_id = ? AND location_id = ?"
    ))
    .bind(category_id)
    .bind(owner_id)
    .bind(location_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(category_not_found)?;

    let project_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = ? AND category = ?")
            .bind(owner_id)
            .bind(&category.name)
            .fetch_one(&mut *tx)
            .await?;

    if project_count > 0 {
        return Err(AppError::in_use(
            "Cannot delete category that is being used by projects",
            project_count,
        ));
    }

    sqlx::query("DELETE FROM categories WHERE id = ? AND owner_id = ?")
        .bind(category_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
