use chrono::Utc;
use sqlx::{Executor, Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use super::locations::find_location;
use crate::error::AppError;
use crate::models::{Project, ProjectFilters, ProjectInput};

const PROJECT_COLUMNS: &str = "id, owner_id, name, description, category, location, \
     status, start_month, start_year, budget, actual_cost, estimated_days, doer, \
     image_filename, created_at, updated_at";

pub fn project_not_found() -> AppError {
    AppError::NotFound("Project not found".to_string())
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[instrument(skip(pool))]
pub async fn get_projects(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    filters: &ProjectFilters,
) -> Result<Vec<Project>, AppError> {
    info!("Listing projects");
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = "
    ));
    query.push_bind(owner_id);

    if let Some(category) = &filters.category {
        query.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(status) = &filters.status {
        query.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(location) = &filters.location {
        query.push(" AND location = ").push_bind(location.clone());
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    query.push(" ORDER BY updated_at DESC, id DESC");

    let rows = query.build_query_as::<Project>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn find_project<'e, E>(
    executor: E,
    owner_id: i64,
    id: i64,
) -> Result<Option<Project>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(pool))]
pub async fn get_project(pool: &Pool<Sqlite>, owner_id: i64, id: i64) -> Result<Project, AppError> {
    info!("Fetching project");
    find_project(pool, owner_id, id)
        .await?
        .ok_or_else(project_not_found)
}

/// A project may only point at the owner's own locations and categories.
/// Missing and foreign references are reported the same way. The category
/// name a project already carries stays valid after the category is renamed.
async fn check_references(
    conn: &mut SqliteConnection,
    owner_id: i64,
    input: &ProjectInput,
    current_category: Option<&str>,
) -> Result<(), AppError> {
    if let Some(location) = &input.location {
        if find_location(&mut *conn, owner_id, location).await?.is_none() {
            return Err(AppError::Validation(format!(
                "location '{}' does not exist",
                location
            )));
        }
    }

    if let Some(category) = input
        .category
        .as_deref()
        .filter(|category| Some(*category) != current_category)
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM categories
                 WHERE owner_id = ? AND name = ? AND (? IS NULL OR location_id = ?)
             )",
        )
        .bind(owner_id)
        .bind(category)
        .bind(input.location.as_deref())
        .bind(input.location.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            return Err(AppError::Validation(format!(
                "category '{}' does not exist",
                category
            )));
        }
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn create_project(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    input: &ProjectInput,
) -> Result<Project, AppError> {
    info!("Creating project");
    let mut tx = pool.begin().await?;

    check_references(&mut tx, owner_id, input, None).await?;

    let now = Utc::now();
    let project = sqlx::query_as::<_, Project>(&format!(
        "INSERT INTO projects (owner_id, name, description, category, location, status,
             start_month, start_year, budget, actual_cost, estimated_days, doer,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.location)
    .bind(input.status.as_str())
    .bind(input.start_month)
    .bind(input.start_year)
    .bind(input.budget)
    .bind(input.actual_cost)
    .bind(input.estimated_days)
    .bind(input.doer.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(project_id = project.id, "Project created");
    Ok(project)
}

/// Replaces every client-writable field and bumps `updated_at`.
#[instrument(skip(pool))]
pub async fn update_project(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    id: i64,
    input: &ProjectInput,
) -> Result<Project, AppError> {
    info!("Updating project");
    let mut tx = pool.begin().await?;

    let existing = find_project(&mut *tx, owner_id, id)
        .await?
        .ok_or_else(project_not_found)?;

    check_references(&mut tx, owner_id, input, existing.category.as_deref()).await?;

    let project = sqlx::query_as::<_, Project>(&format!(
        "UPDATE projects
         SET name = ?, description = ?, category = ?, location = ?, status = ?,
             start_month = ?, start_year = ?, budget = ?, actual_cost = ?,
             estimated_days = ?, doer = ?, updated_at = ?
         WHERE id = ? AND owner_id = ?
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.location)
    .bind(input.status.as_str())
    .bind(input.start_month)
    .bind(input.start_year)
    .bind(input.budget)
    .bind(input.actual_cost)
    .bind(input.estimated_days)
    .bind(input.doer.as_str())
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(project)
}

/// Deletes the project with its photos and notes. Returns the stored blob
/// filenames that no longer have a row pointing at them.
#[instrument(skip(pool))]
pub async fn delete_project(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    id: i64,
) -> Result<Vec<String>, AppError> {
    info!("Deleting project");
    let mut tx = pool.begin().await?;

    let project = find_project(&mut *tx, owner_id, id)
        .await?
        .ok_or_else(project_not_found)?;

    let mut orphaned: Vec<String> =
        sqlx::query_scalar("SELECT filename FROM photos WHERE project_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    orphaned.extend(project.image_filename);

    sqlx::query("DELETE FROM photos WHERE project_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM notes WHERE project_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM projects WHERE id = ? AND owner_id = ?")
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(orphaned)
}

/// Points the project at a new image. Returns the updated project and the
/// filename it pointed at before, if any.
#[instrument(skip(pool))]
pub async fn set_project_image(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    id: i64,
    filename: &str,
) -> Result<(Project, Option<String>), AppError> {
    info!("Setting project image");
    let mut tx = pool.begin().await?;

    let previous = find_project(&mut *tx, owner_id, id)
        .await?
        .ok_or_else(project_not_found)?
        .image_filename;

    let project = sqlx::query_as::<_, Project>(&format!(
        "UPDATE projects SET image_filename = ?, updated_at = ?
         WHERE id = ? AND owner_id = ?
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(filename)
    .bind(Utc::now())
    .bind(id)
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((project, previous))
}
