use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{User, UserCredentials};
use crate::error::{AppError, conflict_on_unique};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, User>(
        "SELECT id, username, email, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool, password))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<User, AppError> {
    info!("Creating user");
    let password_hash = bcrypt::hash(password, HASH_COST)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password_hash, email, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, username, email, created_at",
    )
    .bind(username)
    .bind(password_hash)
    .bind(email)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|err| conflict_on_unique(err, "Username already exists"))?;

    Ok(user)
}

/// Returns the user when the password matches, `None` for an unknown user or
/// a wrong password.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let credentials = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, password_hash FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &credentials.password_hash)? {
        return Ok(None);
    }

    get_user(pool, credentials.id).await.map(Some)
}
