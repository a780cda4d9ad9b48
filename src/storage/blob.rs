//! Profile photo storage on the filesystem.
//!
//! File structure:
//! - `{upload_dir}/pictures/{nanoid}.{ext}`, served at `/uploads/pictures/{file}`
//!
//! The stored file name is generated; only the extension of the client's
//! file name is kept, and only from an allowlist.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// URL prefix under which photos are served.
pub const PHOTO_URL_PREFIX: &str = "/uploads/pictures/";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Error type for photo operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
}

/// Directory holding uploaded pictures.
pub fn pictures_dir(upload_dir: &Path) -> PathBuf {
    upload_dir.join("pictures")
}

/// Create the pictures directory if it doesn't exist.
pub async fn init_storage(upload_dir: &Path) -> Result<(), BlobError> {
    fs::create_dir_all(pictures_dir(upload_dir)).await?;
    Ok(())
}

fn extension_of(file_name: &str) -> Result<String, BlobError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(BlobError::UnsupportedType(file_name.to_string()))
    }
}

/// Write an uploaded photo and return its public URL.
///
/// Uses atomic write (write to temp file, then rename) to prevent partial reads.
pub async fn save_photo(
    upload_dir: &Path,
    file_name: &str,
    content: &[u8],
) -> Result<String, BlobError> {
    let ext = extension_of(file_name)?;
    let stored_name = format!("{}.{}", nanoid::nanoid!(16), ext);

    let dir = pictures_dir(upload_dir);
    fs::create_dir_all(&dir).await?;

    let path = dir.join(&stored_name);
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;

    fs::rename(&temp_path, &path).await?;

    Ok(format!("{}{}", PHOTO_URL_PREFIX, stored_name))
}

/// Delete a previously saved photo given its public URL.
///
/// URLs outside the pictures prefix, or with path separators, are ignored.
/// Returns true if a file was deleted.
pub async fn delete_photo(upload_dir: &Path, url: &str) -> Result<bool, BlobError> {
    let name = match url.strip_prefix(PHOTO_URL_PREFIX) {
        Some(name)
            if !name.is_empty() && !name.contains('/') && !name.contains('\\') && name != ".." =>
        {
            name
        }
        _ => return Ok(false),
    };

    match fs::remove_file(pictures_dir(upload_dir).join(name)).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BlobError::Io(e)),
    }
}
