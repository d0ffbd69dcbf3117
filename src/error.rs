use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        project_count: Option<i64>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub project_count: Option<i64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            project_count: None,
        }
    }
}

impl AppError {
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            project_count: None,
        }
    }

    /// Delete refused because `count` projects still point at the resource.
    pub fn in_use(message: impl Into<String>, count: i64) -> Self {
        AppError::Conflict {
            message: message.into(),
            project_count: Some(count),
        }
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::Authentication(msg) => {
                warn!(message = %msg, context = %ctx, "Authentication error");
                "authentication_error"
            }
            AppError::Authorization(msg) => {
                warn!(message = %msg, context = %ctx, "Authorization error");
                "authorization_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::Conflict {
                message: msg,
                project_count,
            } => {
                warn!(message = %msg, project_count = ?project_count, context = %ctx, "Conflict");
                "conflict_error"
            }
            AppError::Storage(msg) => {
                error!(message = %msg, context = %ctx, "Upload storage error");
                "storage_error"
            }
            AppError::Config(msg) => {
                error!(message = %msg, context = %ctx, "Configuration error");
                "config_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if self.status_code().code >= 500 {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::Conflict { .. } => Status::BadRequest,
            AppError::Storage(_) => Status::InternalServerError,
            AppError::Config(_) => Status::InternalServerError,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    /// What the client gets to see. Storage and internal details stay in the logs.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg) => ErrorResponse::new(msg.clone()),
            AppError::Conflict {
                message,
                project_count,
            } => ErrorResponse {
                error: message.clone(),
                project_count: *project_count,
            },
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Config(_)
            | AppError::Internal(_) => ErrorResponse::new("Internal server error"),
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.log_and_record(&format!("Request to {} {}", req.method(), req.uri()));
        Custom(self.status_code(), Json(self.to_error_response())).respond_to(req)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Storage(error.to_string())
    }
}

/// Turns a unique-constraint violation into a `Conflict` carrying `message`;
/// anything else stays a database error.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(message)
        }
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), Status::InternalServerError);
        assert_eq!(err.to_error_response().error, "Internal server error");

        let err = AppError::Storage("disk full at /var/uploads".to_string());
        assert_eq!(err.to_error_response().error, "Internal server error");
    }

    #[test]
    fn in_use_carries_project_count() {
        let err = AppError::in_use("Cannot delete location that is being used by projects", 3);
        assert_eq!(err.status_code(), Status::BadRequest);

        let body = serde_json::to_value(err.to_error_response()).unwrap();
        assert_eq!(body["projectCount"], 3);
        assert_eq!(
            body["error"],
            "Cannot delete location that is being used by projects"
        );
    }

    #[test]
    fn plain_errors_omit_project_count() {
        let body = serde_json::to_value(AppError::conflict("Location ID already exists").to_error_response())
            .unwrap();
        assert!(body.get("projectCount").is_none());
    }

    #[test]
    fn non_unique_errors_stay_database_errors() {
        let err = conflict_on_unique(sqlx::Error::PoolTimedOut, "duplicate");
        assert!(matches!(err, AppError::Database(_)));
    }
}
