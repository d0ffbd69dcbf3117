use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::projects::{find_project, project_not_found};
use crate::error::AppError;
use crate::models::Note;

#[instrument(skip(pool))]
pub async fn get_notes(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    project_id: i64,
) -> Result<Vec<Note>, AppError> {
    info!("Listing project notes");
    if find_project(pool, owner_id, project_id).await?.is_none() {
        return Err(project_not_found());
    }

    let rows = sqlx::query_as::<_, Note>(
        "SELECT id, project_id, content, created_at FROM notes
         WHERE project_id = ?
         ORDER BY created_at DESC, id DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Stores the trimmed content and returns the note as read back from the
/// database.
#[instrument(skip(pool, content))]
pub async fn create_note(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    project_id: i64,
    content: &str,
) -> Result<Note, AppError> {
    info!("Adding note to project");
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content is required".to_string()));
    }

    let mut tx = pool.begin().await?;

    if find_project(&mut *tx, owner_id, project_id).await?.is_none() {
        return Err(project_not_found());
    }

    let note_id = sqlx::query("INSERT INTO notes (project_id, content, created_at) VALUES (?, ?, ?)")
        .bind(project_id)
        .bind(content)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    let note = sqlx::query_as::<_, Note>(
        "SELECT id, project_id, content, created_at FROM notes WHERE id = ?",
    )
    .bind(note_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(note)
}
