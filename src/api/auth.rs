use chrono::Duration;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::{Validate, ValidationError};

use super::MessageResponse;
use crate::auth::{BearerToken, User};
use crate::db::{authenticate_user, create_user, create_user_session, invalidate_session};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::validation::{JsonBody, JsonValidateExt, non_empty, not_blank};

const MIN_PASSWORD_LEN: usize = 4;

fn password_rules(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new("password")
            .with_message("must be at least 4 characters".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"), length(max = 50))]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "password_rules"))]
    pub password: String,
    #[validate(length(max = 254))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
}

async fn issue_token(
    db: &Pool<Sqlite>,
    config: &AppConfig,
    user: User,
) -> Result<AuthResponse, AppError> {
    let session =
        create_user_session(db, user.id, Duration::hours(config.session_ttl_hours)).await?;
    Ok(AuthResponse {
        user,
        token: session.token,
    })
}

#[post("/auth/register", data = "<registration>")]
pub async fn api_register(
    registration: JsonBody<'_, RegisterRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Created<Json<AuthResponse>>, AppError> {
    let registration = registration.validated()?;
    let username = registration.username.trim();
    let email = non_empty(registration.email);

    let user = create_user(db, username, &registration.password, email.as_deref()).await?;
    info!(user_id = user.id, "Registered user");

    let response = issue_token(db, config, user).await?;
    Ok(Created::new("/api/auth/me").body(Json(response)))
}

#[post("/auth/login", data = "<login>")]
pub async fn api_login(
    login: JsonBody<'_, LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<AuthResponse>, AppError> {
    let login = login.validated()?;

    match authenticate_user(db, login.username.trim(), &login.password).await? {
        Some(user) => Ok(Json(issue_token(db, config, user).await?)),
        None => Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        )),
    }
}

#[get("/auth/me")]
pub async fn api_me(user: User) -> Json<MeResponse> {
    Json(MeResponse { user })
}

#[post("/auth/logout")]
pub async fn api_logout(
    _user: User,
    token: BearerToken,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, AppError> {
    invalidate_session(db, &token.0).await?;
    Ok(MessageResponse::new("Logged out successfully"))
}

pub fn routes() -> Vec<Route> {
    routes![api_register, api_login, api_me, api_logout]
}
