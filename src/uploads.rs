use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

const MAX_EXTENSION_LEN: usize = 8;

/// A blob written to the upload directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
}

/// Writes uploaded files under generated names and removes them again.
/// Files are served back from the same directory under `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        is_plain_filename(filename).then(|| self.root.join(filename))
    }

    #[instrument(skip(self, file))]
    pub async fn store(&self, file: &mut TempFile<'_>) -> Result<StoredFile, AppError> {
        let original_name = original_name(file);
        let filename = match extension(file) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        file.move_copy_to(self.root.join(&filename)).await?;
        info!(%filename, size = file.len(), "Stored upload");

        Ok(StoredFile {
            filename,
            original_name,
        })
    }

    /// Best effort: failures are logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn remove(&self, filename: &str) {
        let Some(path) = self.path_for(filename) else {
            warn!(%filename, "Refusing to remove upload with a path in its name");
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(%filename, "Removed upload"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(%filename, "Upload already gone")
            }
            Err(err) => warn!(%filename, error = %err, "Failed to remove upload"),
        }
    }
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename)
}

fn original_name(file: &TempFile<'_>) -> String {
    file.raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string())
}

fn extension(file: &TempFile<'_>) -> Option<String> {
    let from_name = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_string);

    let from_content_type = || {
        file.content_type()
            .and_then(|ct| ct.extension())
            .map(|ext| ext.to_string())
    };

    from_name
        .or_else(from_content_type)
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}
