use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use sqlx::SqlitePool;

use crate::db::{get_session_by_token, get_user};
use crate::error::AppError;

use super::User;

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token<'a>(request: &'a Request<'_>) -> Option<&'a str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The raw bearer token of an authenticated request.
pub struct BearerToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match bearer_token(request) {
            Some(token) => Outcome::Success(BearerToken(token.to_string())),
            None => Outcome::Error((
                Status::Unauthorized,
                AppError::Authentication("Access token required".to_string()),
            )),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let Some(token) = bearer_token(request) else {
            return Outcome::Error((
                Status::Unauthorized,
                AppError::Authentication("Access token required".to_string()),
            ));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((
                    Status::InternalServerError,
                    AppError::Internal("Database pool not managed".to_string()),
                ));
            }
        };

        let invalid = || {
            Outcome::Error((
                Status::Forbidden,
                AppError::Authorization("Invalid or expired token".to_string()),
            ))
        };

        match get_session_by_token(db, token).await {
            Ok(Some(session)) if session.is_valid() => match get_user(db, session.user_id).await {
                Ok(user) => {
                    tracing::info!(username = %user.username, "User authenticated via bearer token");
                    Outcome::Success(user)
                }
                Err(AppError::NotFound(_)) => {
                    tracing::warn!(user_id = %session.user_id, "Session points at a missing user");
                    invalid()
                }
                Err(err) => {
                    tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                    Outcome::Error((Status::InternalServerError, err))
                }
            },
            Ok(Some(_)) => {
                tracing::warn!("Session token expired");
                invalid()
            }
            Ok(None) => {
                tracing::warn!("Unknown session token");
                invalid()
            }
            Err(err) => {
                tracing::error!(error = ?err, "Session lookup failed");
                Outcome::Error((Status::InternalServerError, err))
            }
        }
    }
}
