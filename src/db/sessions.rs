use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::UserSession;
use crate::error::AppError;

#[instrument(skip(pool))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    ttl: Duration,
) -> Result<UserSession, AppError> {
    info!("Creating user session");
    let now = Utc::now();

    let session = sqlx::query_as::<_, UserSession>(
        "INSERT INTO user_sessions (user_id, token, created_at, expires_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, user_id, token, created_at, expires_at",
    )
    .bind(user_id)
    .bind(UserSession::generate_token())
    .bind(now)
    .bind(now + ttl)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<Option<UserSession>, AppError> {
    info!("Getting session by token");
    let session = sqlx::query_as::<_, UserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");
    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
