// src/services/storage.rs

use std::path::{Path, PathBuf};

use crate::{error::AppError, utils::sanitize::extension_of};

pub const ALLOWED_MIME_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/tiff",
    "image/bmp",
    "application/pdf",
];

pub const ALLOWED_EXTENSIONS: [&str; 8] =
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".pdf", ".tiff", ".bmp"];

/// Either a known MIME type or a known extension is enough.
pub fn is_allowed_upload(original_name: &str, mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
        || extension_of(original_name)
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}

/// Unique on-disk name: `document-<unix millis>-<uuid><ext>`.
pub fn stored_file_name(original_name: &str) -> String {
    format!(
        "document-{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        extension_of(original_name).unwrap_or_default()
    )
}

/// Writes an upload into `dir`, creating the directory on first use.
pub async fn save_upload(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Removes a stored file; a file that is already gone is not an error.
pub async fn remove_upload(path: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Stored file already missing: {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
