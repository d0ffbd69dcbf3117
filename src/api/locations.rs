use std::collections::BTreeMap;

use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::MessageResponse;
use crate::auth::User;
use crate::db::{
    create_location, delete_location, get_location, get_location_stats, get_locations,
    get_project_count, get_stats_for_location, update_location,
};
use crate::error::AppError;
use crate::models::{Location, LocationChanges, LocationStats, NewLocation};
use crate::validation::{JsonBody, JsonValidateExt, hex_color, location_slug, non_empty, not_blank};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationRequest {
    #[serde(default)]
    #[validate(custom(function = "location_slug"), length(max = 64))]
    pub id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub name: String,
    #[validate(length(max = 16))]
    pub icon: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub color: Option<String>,
}

impl From<CreateLocationRequest> for NewLocation {
    fn from(request: CreateLocationRequest) -> Self {
        Self {
            id: request.id.trim().to_string(),
            name: request.name.trim().to_string(),
            icon: non_empty(request.icon),
            color: non_empty(request.color),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub name: String,
    #[validate(length(max = 16))]
    pub icon: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub color: Option<String>,
}

impl From<UpdateLocationRequest> for LocationChanges {
    fn from(request: UpdateLocationRequest) -> Self {
        Self {
            name: request.name.trim().to_string(),
            icon: non_empty(request.icon),
            color: non_empty(request.color),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCountResponse {
    pub location_id: String,
    pub project_count: i64,
}

#[get("/locations")]
pub async fn api_get_locations(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Location>>, AppError> {
    Ok(Json(get_locations(db, user.id).await?))
}

#[get("/locations/stats")]
pub async fn api_get_location_stats(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<BTreeMap<String, LocationStats>>, AppError> {
    Ok(Json(get_location_stats(db, user.id).await?))
}

#[get("/locations/<id>")]
pub async fn api_get_location(
    id: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Location>, AppError> {
    Ok(Json(get_location(db, user.id, id).await?))
}

#[get("/locations/<id>/stats")]
pub async fn api_get_stats_for_location(
    id: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LocationStats>, AppError> {
    Ok(Json(get_stats_for_location(db, user.id, id).await?))
}

#[get("/locations/<id>/project-count")]
pub async fn api_get_project_count(
    id: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProjectCountResponse>, AppError> {
    let project_count = get_project_count(db, user.id, id).await?;
    Ok(Json(ProjectCountResponse {
        location_id: id.to_string(),
        project_count,
    }))
}

#[post("/locations", data = "<location>")]
pub async fn api_create_location(
    location: JsonBody<'_, CreateLocationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Created<Json<Location>>, AppError> {
    let location = NewLocation::from(location.validated()?);
    let created = create_location(db, user.id, &location).await?;
    Ok(Created::new(format!("/api/locations/{}", created.id)).body(Json(created)))
}

#[put("/locations/<id>", data = "<changes>")]
pub async fn api_update_location(
    id: &str,
    changes: JsonBody<'_, UpdateLocationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Location>, AppError> {
    let changes = LocationChanges::from(changes.validated()?);
    Ok(Json(update_location(db, user.id, id, &changes).await?))
}

#[delete("/locations/<id>")]
pub async fn api_delete_location(
    id: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, AppError> {
    delete_location(db, user.id, id).await?;
    Ok(MessageResponse::new("Location deleted successfully"))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_get_locations,
        api_get_location_stats,
        api_get_location,
        api_get_stats_for_location,
        api_get_project_count,
        api_create_location,
        api_update_location,
        api_delete_location,
    ]
}
