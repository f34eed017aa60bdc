//! Image uploads. Files are checked, re-encoded to JPEG and placed in an
//! [`ObjectStore`]; callers get back `{storageKey, cdnUrl}` references.

use crate::models::UploadedImage;
use crate::services::image;
use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("No images provided")]
    NoFiles,
    #[error("Too many files: at most {0} per upload")]
    TooManyFiles(usize),
    #[error("File type not allowed: {0}. Only JPEG, PNG, and WebP are supported.")]
    UnsupportedType(String),
    #[error("File too large: {name}. Maximum size is {max_bytes} bytes.")]
    TooLarge { name: String, max_bytes: usize },
    #[error("Could not read image {name}")]
    Unreadable {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Object store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl MediaError {
    /// True when the uploader can fix the problem.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_files: usize,
    pub max_bytes: usize,
    pub max_width: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_bytes: DEFAULT_MAX_FILE_SIZE,
            max_width: image::MAX_WIDTH,
        }
    }
}

/// Blob storage for uploaded images.
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key` and returns its public address.
    fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;
    fn delete(&self, key: &str) -> Result<()>;
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Keys are relative paths made only of normal components.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('\\')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Object store backed by a directory, published under `cdn_url`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    cdn_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, cdn_url: &str) -> Self {
        Self {
            root: root.into(),
            cdn_url: cdn_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            anyhow::bail!("Invalid object key: {}", key);
        }
        Ok(self.root.join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
        Ok(format!("{}/{}", self.cdn_url, key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }
}

pub fn validate_files(files: &[UploadFile], policy: &UploadPolicy) -> Result<(), MediaError> {
    if files.is_empty() {
        return Err(MediaError::NoFiles);
    }
    if files.len() > policy.max_files {
        return Err(MediaError::TooManyFiles(policy.max_files));
    }

    for file in files {
        if !image::is_supported_image(&file.content_type) {
            return Err(MediaError::UnsupportedType(file.content_type.clone()));
        }
        // The declared type comes from the client; trust the bytes instead.
        let sniffed = infer::get(&file.data).map(|t| t.mime_type());
        match sniffed {
            Some(mime) if image::is_supported_image(mime) => {}
            other => {
                return Err(MediaError::UnsupportedType(
                    other.unwrap_or("unknown").to_string(),
                ))
            }
        }
        if file.data.len() > policy.max_bytes {
            return Err(MediaError::TooLarge {
                name: file.name.clone(),
                max_bytes: policy.max_bytes,
            });
        }
    }

    Ok(())
}

fn folder_for(product_id: Option<&str>) -> String {
    match product_id {
        Some(id)
            if !id.is_empty()
                && id.len() <= 64
                && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            id.to_string()
        }
        _ => format!("temp-{}", chrono::Utc::now().timestamp_millis()),
    }
}

/// Validates every file, then stores them one by one. Objects already stored
/// are removed again if a later file fails.
pub fn upload_images<S>(
    store: &S,
    owner: &str,
    product_id: Option<&str>,
    files: &[UploadFile],
    policy: &UploadPolicy,
) -> Result<Vec<UploadedImage>, MediaError>
where
    S: ObjectStore + ?Sized,
{
    validate_files(files, policy)?;

    let folder = folder_for(product_id);
    let mut uploaded: Vec<UploadedImage> = Vec::with_capacity(files.len());

    for file in files {
        let result = image::to_jpeg(&file.data, &file.content_type, Some(policy.max_width))
            .map_err(|source| MediaError::Unreadable {
                name: file.name.clone(),
                source,
            })
            .and_then(|jpeg| {
                let key = format!("{}/{}/{}.jpg", owner, folder, Uuid::new_v4());
                let cdn_url = store.put(&key, &jpeg, "image/jpeg")?;
                Ok(UploadedImage {
                    storage_key: key,
                    cdn_url,
                })
            });

        match result {
            Ok(image) => uploaded.push(image),
            Err(err) => {
                for image in &uploaded {
                    if let Err(e) = store.delete(&image.storage_key) {
                        tracing::warn!(
                            "Failed to remove {} after aborted upload: {}",
                            image.storage_key,
                            e
                        );
                    }
                }
                return Err(err);
            }
        }
    }

    tracing::info!("Stored {} image(s) for {}", uploaded.len(), owner);
    Ok(uploaded)
}
