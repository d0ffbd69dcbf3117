use std::time::Duration;

use anyhow::anyhow;
use rocket::tokio;
use sqlx::SqlitePool;
use tracing::{error, info};

use renovation_tracker::build_rocket;
use renovation_tracker::db::{self, clean_expired_sessions};
use renovation_tracker::env::{AppConfig, load_environment};
use renovation_tracker::telemetry::init_tracing;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
        }
    });
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    load_environment()?;
    let config = AppConfig::from_env()?;
    let _otel_guard = init_tracing(&config.telemetry);

    let pool = db::connect(&config.database_url, config.max_connections).await?;
    db::migrate(&pool).await?;
    info!("Migrations completed successfully");

    spawn_session_cleanup(pool.clone());

    let rocket = build_rocket(pool, config).await?;
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed to launch: {}", e))?;

    Ok(())
}
