use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::MessageResponse;
use crate::auth::User;
use crate::db::{create_category, delete_category, get_categories, update_category};
use crate::error::AppError;
use crate::models::Category;
use crate::validation::{JsonBody, JsonValidateExt, not_blank};

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub name: String,
}

#[get("/categories/<location_id>")]
pub async fn api_get_categories(
    location_id: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(get_categories(db, user.id, location_id).await?))
}

#[post("/categories/<location_id>", data = "<category>")]
pub async fn api_create_category(
    location_id: &str,
    category: JsonBody<'_, CategoryRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Created<Json<Category>>, AppError> {
    let category = category.validated()?;
    let created = create_category(db, user.id, location_id, category.name.trim()).await?;
    Ok(Created::new(format!("/api/categories/{}/{}", location_id, created.id))
        .body(Json(created)))
}

#[put("/categories/<location_id>/<category_id>", data = "<category>")]
pub async fn api_update_category(
    location_id: &str,
    category_id: i64,
    category: JsonBody<'_, CategoryRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Category>, AppError> {
    let category = category.validated()?;
    let updated = update_category(
        db,
        user.id,
        location_id,
        category_id,
        category.name.trim(),
    )
    .await?;
    Ok(Json(updated))
}

#[delete("/categories/<location_id>/<category_id>")]
pub async fn api_delete_category(
    location_id: &str,
    category_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, AppError> {
    delete_category(db, user.id, location_id, category_id).await?;
    Ok(MessageResponse::new("Category deleted successfully"))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_get_categories,
        api_create_category,
        api_update_category,
        api_delete_category,
    ]
}
