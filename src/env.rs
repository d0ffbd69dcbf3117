use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://renovation-tracker.db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_MIB: u64 = 10;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub fn load_environment() -> Result<(), AppError> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string());

    let env_files = [
        "config/common.env".to_string(),
        format!("config/{}.env", profile),
        ".secrets.env".to_string(),
    ];

    for env_file in env_files {
        load_env_file(&env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), AppError> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)
        .map_err(|e| AppError::Config(format!("Failed to load {}: {}", path, e)))?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub otlp_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub upload_dir: PathBuf,
    pub max_upload_mib: u64,
    pub session_ttl_hours: i64,
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_mib: DEFAULT_MAX_UPLOAD_MIB,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                otlp_headers: Vec::new(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = AppConfig::default();

        Ok(Self {
            database_url: string_var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            upload_dir: string_var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_mib: parsed_var("MAX_UPLOAD_MIB")?.unwrap_or(defaults.max_upload_mib),
            session_ttl_hours: parsed_var("SESSION_TTL_HOURS")?
                .unwrap_or(defaults.session_ttl_hours),
            telemetry: TelemetryConfig {
                otlp_endpoint: string_var("OTEL_EXPORTER_OTLP_ENDPOINT"),
                otlp_headers: string_var("OTEL_EXPORTER_OTLP_HEADERS")
                    .map(|raw| parse_headers(&raw))
                    .unwrap_or_default(),
            },
        })
    }
}

fn string_var(key: &str) -> Option<String> {
    dotenvy::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match string_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(None),
    }
}

/// Parses `key=value,key2=value2`; malformed pairs are skipped.
pub fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
