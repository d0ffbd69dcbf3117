use chrono::Utc;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Route};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorResponse;

pub mod auth;
pub mod categories;
pub mod locations;
pub mod projects;

/// Body of plain acknowledgements such as successful deletes.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[get("/health")]
pub fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

fn error_body(status: Status, message: &str) -> Custom<Json<ErrorResponse>> {
    Custom(status, Json(ErrorResponse::new(message)))
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Custom<Json<ErrorResponse>> {
    error_body(Status::BadRequest, "Bad request")
}

#[catch(401)]
pub fn unauthorized(req: &Request) -> Custom<Json<ErrorResponse>> {
    warn!(uri = %req.uri(), "Unauthorized access attempt");
    error_body(Status::Unauthorized, "Access token required")
}

#[catch(403)]
pub fn forbidden(req: &Request) -> Custom<Json<ErrorResponse>> {
    warn!(uri = %req.uri(), "Forbidden access attempt");
    error_body(Status::Forbidden, "Invalid or expired token")
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Custom<Json<ErrorResponse>> {
    error_body(Status::NotFound, "Not found")
}

#[catch(413)]
pub fn payload_too_large(_req: &Request) -> Custom<Json<ErrorResponse>> {
    error_body(Status::PayloadTooLarge, "Upload is too large")
}

// Upload routes forward non-multipart bodies with 415.
#[catch(415)]
pub fn unsupported_media_type(req: &Request) -> Custom<Json<ErrorResponse>> {
    warn!(uri = %req.uri(), "Upload without a multipart body");
    error_body(Status::BadRequest, "Expected a multipart/form-data upload")
}

// Form and JSON guards fail with 422; clients only ever see 400.
#[catch(422)]
pub fn unprocessable(_req: &Request) -> Custom<Json<ErrorResponse>> {
    error_body(Status::BadRequest, "Invalid request body")
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Custom<Json<ErrorResponse>> {
    error_body(Status::InternalServerError, "Internal server error")
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        payload_too_large,
        unsupported_media_type,
        unprocessable,
        internal_error,
    ]
}

pub fn routes() -> Vec<Route> {
    let mut routes = routes![health];
    routes.extend(auth::routes());
    routes.extend(locations::routes());
    routes.extend(categories::routes());
    routes.extend(projects::routes());
    routes
}
