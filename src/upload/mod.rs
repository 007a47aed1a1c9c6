//! Image uploads for image components.
//!
//! Uploads are written to a temporary file next to the final location and
//! renamed into place only after the whole body has been accepted. The
//! temporary file is owned by a guard that removes it on every other path,
//! including early returns, errors and dropped futures.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Accepted content types and the extension stored files get
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("No image provided")]
    Missing,

    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Response body of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub url: String,
}

/// File extension for an allowed content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Local directory of uploaded images
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_base_url: String,
    max_size_bytes: usize,
}

impl ImageStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            max_size_bytes: config.max_size_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Create the upload directory if missing
    pub async fn ensure_dir(&self) -> UploadResult<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Start an upload after checking the declared content type
    pub async fn begin(&self, content_type: Option<&str>) -> UploadResult<PendingUpload> {
        let content_type = content_type.ok_or(UploadError::Missing)?;
        let extension = extension_for(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

        self.ensure_dir().await?;
        let id = Uuid::new_v4();
        let temp = TempFileGuard::new(self.dir.join(format!(".{}.part", id)));
        let file = fs::File::create(temp.path()).await?;

        Ok(PendingUpload {
            file,
            temp,
            final_name: format!("{}.{}", id, extension),
            dir: self.dir.clone(),
            public_base_url: self.public_base_url.clone(),
            written: 0,
            limit: self.max_size_bytes,
        })
    }

    /// Store a complete in-memory image
    pub async fn store(&self, content_type: Option<&str>, data: &[u8]) -> UploadResult<StoredImage> {
        let mut upload = self.begin(content_type).await?;
        upload.write(data).await?;
        upload.finish().await
    }
}

/// An upload in progress; dropping it without `finish` discards the data
pub struct PendingUpload {
    file: fs::File,
    temp: TempFileGuard,
    final_name: String,
    dir: PathBuf,
    public_base_url: String,
    written: usize,
    limit: usize,
}

impl PendingUpload {
    /// Append a chunk, failing once the size limit is exceeded
    pub async fn write(&mut self, chunk: &[u8]) -> UploadResult<()> {
        self.written += chunk.len();
        if self.written > self.limit {
            return Err(UploadError::TooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        Ok(())
    }

    /// Flush and move the file to its public name
    pub async fn finish(mut self) -> UploadResult<StoredImage> {
        if self.written == 0 {
            return Err(UploadError::Missing);
        }
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        let target = self.dir.join(&self.final_name);
        fs::rename(self.temp.path(), &target).await?;
        self.temp.disarm();

        tracing::info!(file = %self.final_name, bytes = self.written, "Image uploaded");
        Ok(StoredImage {
            url: format!("{}/{}", self.public_base_url, self.final_name),
        })
    }
}

/// Removes the wrapped file on drop unless disarmed
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temporary upload");
                }
            }
        }
    }
}
