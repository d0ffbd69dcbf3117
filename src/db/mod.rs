use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

mod categories;
mod locations;
mod notes;
mod photos;
mod projects;
mod sessions;
mod stats;
mod users;

pub use categories::*;
pub use locations::*;
pub use notes::*;
pub use photos::*;
pub use projects::*;
pub use sessions::*;
pub use stats::*;
pub use users::*;

/// Opens the pool, creating the database file if needed. Foreign keys are
/// enforced on every connection.
#[instrument]
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Pool<Sqlite>, AppError> {
    info!("Connecting to SQLite database");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[instrument(skip(pool))]
pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
