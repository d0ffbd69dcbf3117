use std::collections::BTreeMap;

use sqlx::{Executor, Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use super::locations::{find_location, location_not_found};
use crate::error::AppError;
use crate::models::{LocationStats, StatsBucket};

/// One row per (location, completion bucket). `completed` is NULL for a
/// location without projects.
#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    location_id: String,
    completed: Option<i64>,
    project_count: i64,
    total_budget: f64,
    total_spent: f64,
    total_estimated_days: i64,
}

const STATS_QUERY: &str = "SELECT l.id AS location_id,
        CASE
            WHEN p.id IS NULL THEN NULL
            WHEN p.status = 'completed' THEN 1
            ELSE 0
        END AS completed,
        COUNT(p.id) AS project_count,
        CAST(COALESCE(SUM(p.budget), 0) AS REAL) AS total_budget,
        CAST(COALESCE(SUM(p.actual_cost), 0) AS REAL) AS total_spent,
        CAST(COALESCE(SUM(p.estimated_days), 0) AS INTEGER) AS total_estimated_days
    FROM locations l
    LEFT JOIN projects p ON p.owner_id = l.owner_id AND p.location = l.id
    WHERE l.owner_id = ";

async fn fetch_stats(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: Option<&str>,
) -> Result<BTreeMap<String, LocationStats>, AppError> {
    let mut query = QueryBuilder::<Sqlite>::new(STATS_QUERY);
    query.push_bind(owner_id);
    if let Some(location_id) = location_id {
        query.push(" AND l.id = ").push_bind(location_id.to_string());
    }
    query.push(" GROUP BY l.id, completed");

    let rows = query.build_query_as::<BucketRow>().fetch_all(pool).await?;

    let mut stats: BTreeMap<String, LocationStats> = BTreeMap::new();
    for row in rows {
        let entry = stats.entry(row.location_id).or_default();
        if let Some(completed) = row.completed {
            entry.record(
                completed == 1,
                &StatsBucket {
                    project_count: row.project_count,
                    total_budget: row.total_budget,
                    total_spent: row.total_spent,
                    total_estimated_days: row.total_estimated_days,
                },
            );
        }
    }

    Ok(stats)
}

/// Stats for every location of the owner, including locations without
/// projects, computed with a single grouped query.
#[instrument(skip(pool))]
pub async fn get_location_stats(
    pool: &Pool<Sqlite>,
    owner_id: i64,
) -> Result<BTreeMap<String, LocationStats>, AppError> {
    info!("Computing location stats");
    fetch_stats(pool, owner_id, None).await
}

#[instrument(skip(pool))]
pub async fn get_stats_for_location(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
) -> Result<LocationStats, AppError> {
    info!("Computing stats for location");
    let mut stats = fetch_stats(pool, owner_id, Some(location_id)).await?;
    stats.remove(location_id).ok_or_else(location_not_found)
}

/// Number of the owner's projects pointing at `location_id`.
pub async fn project_count_for_location<'e, E>(
    executor: E,
    owner_id: i64,
    location_id: &str,
) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = ? AND location = ?")
            .bind(owner_id)
            .bind(location_id)
            .fetch_one(executor)
            .await?;

    Ok(count)
}

/// Like [`project_count_for_location`], but 404s for a location the owner
/// does not have.
#[instrument(skip(pool))]
pub async fn get_project_count(
    pool: &Pool<Sqlite>,
    owner_id: i64,
    location_id: &str,
) -> Result<i64, AppError> {
    info!("Counting projects for location");
    if find_location(pool, owner_id, location_id).await?.is_none() {
        return Err(location_not_found());
    }
    project_count_for_location(pool, owner_id, location_id).await
}
