use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{FromForm, Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use super::MessageResponse;
use crate::auth::User;
use crate::db::{
    create_note, create_photo, create_project, delete_project, get_notes, get_photos,
    get_project, get_projects, set_project_image, update_project,
};
use crate::error::AppError;
use crate::models::{Doer, NewPhoto, Note, Photo, Project, ProjectFilters, ProjectInput, ProjectStatus};
use crate::uploads::UploadStore;
use crate::validation::{JsonBody, JsonValidateExt, non_empty, not_blank};

#[derive(Debug, Deserialize, Validate)]
pub struct ProjectRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    #[validate(range(min = 1, max = 12))]
    pub start_month: Option<i64>,
    pub start_year: Option<i64>,
    #[validate(range(min = 0.0))]
    pub budget: Option<f64>,
    #[validate(range(min = 0.0))]
    pub actual_cost: Option<f64>,
    #[validate(range(min = 0))]
    pub estimated_days: Option<i64>,
    pub doer: Option<String>,
}

impl ProjectRequest {
    /// Applies the `planning`/`me` defaults and rejects unknown enum values.
    pub fn into_input(self) -> Result<ProjectInput, AppError> {
        let status = non_empty(self.status)
            .map(|s| s.parse::<ProjectStatus>())
            .transpose()?
            .unwrap_or_default();
        let doer = non_empty(self.doer)
            .map(|d| d.parse::<Doer>())
            .transpose()?
            .unwrap_or_default();

        Ok(ProjectInput {
            name: self.name.trim().to_string(),
            description: non_empty(self.description),
            category: non_empty(self.category),
            location: non_empty(self.location),
            status,
            start_month: self.start_month,
            start_year: self.start_year,
            budget: self.budget,
            actual_cost: self.actual_cost,
            estimated_days: self.estimated_days,
            doer,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub content: String,
}

#[derive(FromForm)]
pub struct PhotoUpload<'r> {
    pub photo: Option<TempFile<'r>>,
    pub caption: Option<String>,
    pub is_before_photo: Option<String>,
}

#[derive(FromForm)]
pub struct ImageUpload<'r> {
    pub image: Option<TempFile<'r>>,
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "on" | "yes")
    )
}

fn require_file<'a, 'r>(
    file: &'a mut Option<TempFile<'r>>,
    message: &str,
) -> Result<&'a mut TempFile<'r>, AppError> {
    match file {
        Some(file) if file.len() > 0 => Ok(file),
        _ => Err(AppError::Validation(message.to_string())),
    }
}

#[get("/projects?<filters..>")]
pub async fn api_get_projects(
    filters: ProjectFilters,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Project>>, AppError> {
    let filters = filters.normalized();
    Ok(Json(get_projects(db, user.id, &filters).await?))
}

#[get("/projects/<id>")]
pub async fn api_get_project(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(get_project(db, user.id, id).await?))
}

#[post("/projects", data = "<project>")]
pub async fn api_create_project(
    project: JsonBody<'_, ProjectRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Created<Json<Project>>, AppError> {
    let input = project.validated()?.into_input()?;
    let created = create_project(db, user.id, &input).await?;
    Ok(Created::new(format!("/api/projects/{}", created.id)).body(Json(created)))
}

#[put("/projects/<id>", data = "<project>")]
pub async fn api_update_project(
    id: i64,
    project: JsonBody<'_, ProjectRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Project>, AppError> {
    let input = project.validated()?.into_input()?;
    Ok(Json(update_project(db, user.id, id, &input).await?))
}

#[delete("/projects/<id>")]
pub async fn api_delete_project(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    uploads: &State<UploadStore>,
) -> Result<Json<MessageResponse>, AppError> {
    let orphaned = delete_project(db, user.id, id).await?;
    for filename in &orphaned {
        uploads.remove(filename).await;
    }
    Ok(MessageResponse::new("Project deleted successfully"))
}

#[get("/projects/<id>/photos")]
pub async fn api_get_photos(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Photo>>, AppError> {
    Ok(Json(get_photos(db, user.id, id).await?))
}

#[post("/projects/<id>/photos", data = "<upload>")]
pub async fn api_add_photo(
    id: i64,
    mut upload: Form<PhotoUpload<'_>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    uploads: &State<UploadStore>,
) -> Result<Created<Json<Photo>>, AppError> {
    get_project(db, user.id, id).await?;

    let file = require_file(&mut upload.photo, "No file uploaded")?;
    let stored = uploads.store(file).await?;

    let photo = NewPhoto {
        filename: stored.filename.clone(),
        original_name: stored.original_name,
        caption: non_empty(upload.caption.clone()),
        is_before_photo: is_truthy(upload.is_before_photo.as_deref()),
    };

    match create_photo(db, user.id, id, &photo).await {
        Ok(photo) => {
            info!(project_id = id, photo_id = photo.id, "Photo added");
            Ok(Created::new(format!("/uploads/{}", photo.filename)).body(Json(photo)))
        }
        Err(err) => {
            uploads.remove(&stored.filename).await;
            Err(err)
        }
    }
}

#[post("/projects/<id>/image", data = "<upload>")]
pub async fn api_set_image(
    id: i64,
    mut upload: Form<ImageUpload<'_>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    uploads: &State<UploadStore>,
) -> Result<Json<Project>, AppError> {
    get_project(db, user.id, id).await?;

    let file = require_file(&mut upload.image, "No image file uploaded")?;
    let stored = uploads.store(file).await?;

    match set_project_image(db, user.id, id, &stored.filename).await {
        Ok((project, previous)) => {
            if let Some(previous) = previous.filter(|p| *p != stored.filename) {
                uploads.remove(&previous).await;
            }
            Ok(Json(project))
        }
        Err(err) => {
            uploads.remove(&stored.filename).await;
            Err(err)
        }
    }
}

#[get("/projects/<id>/notes")]
pub async fn api_get_notes(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Note>>, AppError> {
    Ok(Json(get_notes(db, user.id, id).await?))
}

#[post("/projects/<id>/notes", data = "<note>")]
pub async fn api_add_note(
    id: i64,
    note: JsonBody<'_, NoteRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Created<Json<Note>>, AppError> {
    let note = note.validated()?;
    let created = create_note(db, user.id, id, &note.content).await?;
    Ok(Created::new(format!("/api/projects/{}/notes", id)).body(Json(created)))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_get_projects,
        api_get_project,
        api_create_project,
        api_update_project,
        api_delete_project,
        api_get_photos,
        api_add_photo,
        api_set_image,
        api_get_notes,
        api_add_note,
    ]
}
