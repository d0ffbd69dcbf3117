use once_cell::sync::Lazy;
use regex::Regex;
use rocket::serde::json::{Error as JsonError, Json};
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;

static LOCATION_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("location slug pattern"));

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex color pattern"));

/// A JSON request body whose parse failure is still handed to the handler.
pub type JsonBody<'r, T> = Result<Json<T>, JsonError<'r>>;

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

pub fn location_slug(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if !LOCATION_SLUG.is_match(value) {
        return Err(ValidationError::new("slug").with_message(
            "may only contain letters, digits, '-' and '_'".into(),
        ));
    }
    Ok(())
}

// Blank colors are treated as absent later on.
pub fn hex_color(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || HEX_COLOR.is_match(value) {
        return Ok(());
    }
    Err(ValidationError::new("color").with_message("must be a #RRGGBB hex color".into()))
}

fn describe_field(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return format!("{} {}", field, message);
    }

    match error.code.as_ref() {
        "required" => format!("{} is required", field),
        "range" => format!("{} is out of range", field),
        "length" => format!("{} is too long", field),
        _ => format!("{} is invalid", field),
    }
}

/// One message per failing field, in field order, joined with `; `.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .filter_map(|(field, field_errors)| {
            field_errors
                .first()
                .map(|error| describe_field(field, error))
        })
        .collect();

    messages.sort();
    messages.join("; ")
}

pub trait JsonValidateExt<T> {
    fn validated(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    #[instrument(skip_all)]
    fn validated(self) -> Result<T, AppError> {
        let inner = self.into_inner();
        inner
            .validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;
        Ok(inner)
    }
}

impl<T: Validate> JsonValidateExt<T> for JsonBody<'_, T> {
    fn validated(self) -> Result<T, AppError> {
        match self {
            Ok(json) => json.validated(),
            Err(JsonError::Io(err)) => Err(AppError::Validation(format!(
                "Could not read request body: {}",
                err
            ))),
            Err(JsonError::Parse(_, err)) => {
                Err(AppError::Validation(format!("Invalid JSON body: {}", err)))
            }
        }
    }
}

/// `Some("")` and `Some("   ")` become `None`; other values are trimmed.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
