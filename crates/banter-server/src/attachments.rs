use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Extensions we accept for uploaded images, and the content types they
/// are served back with.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// Content type for a stored attachment name, based on its extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("");
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, ct)| *ct)
        .unwrap_or("application/octet-stream")
}

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix — skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// On-disk storage for message image attachments.  Files are stored under
/// random UUID names with the original extension preserved, so nothing a
/// client sends ever becomes a filesystem path.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    base_path: PathBuf,
    max_size: usize,
}

impl AttachmentStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Internal(format!(
                "Failed to create attachment directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Attachment store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Store an uploaded image and return its generated file name.
    pub async fn save(&self, data: &[u8], original_name: &str) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty attachment".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::AttachmentTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let ext = original_name
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| IMAGE_TYPES.iter().any(|(known, _)| known == e))
            .ok_or_else(|| {
                ServerError::BadRequest("Unsupported attachment type".to_string())
            })?;

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.safe_path(&name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::Internal(format!("Failed to write attachment {}: {}", name, e))
        })?;

        debug!(name = %name, size = data.len(), "Stored attachment");
        Ok(name)
    }

    /// Read a previously stored attachment by its generated name.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("Attachment {}", name)));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::Internal(format!("Failed to read attachment {}: {}", name, e))
        })?;

        debug!(name = %name, size = data.len(), "Retrieved attachment");
        Ok(data)
    }

    /// Safe attachment path that validates against traversal.
    fn safe_path(&self, name: &str) -> Result<PathBuf, ServerError> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        let raw = self.base_path.join(name);
        ensure_within(&self.base_path, &raw)
    }
}
