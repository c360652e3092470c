//! Uploaded image storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use placebook_core::validation::sanitize_filename;
use rand::RngCore;
use thiserror::Error;

/// Blob storage errors.
#[derive(Error, Debug)]
pub enum BlobError {
    /// Filename would escape the storage root.
    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    /// No such blob.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Blob IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage for image files keyed by generated filename.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the generated filename.
    ///
    /// Names are prefixed with the current time and a random tag, so two
    /// uploads of the same original file never collide.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, BlobError>;

    /// Remove a previously stored file.
    async fn delete(&self, filename: &str) -> Result<(), BlobError>;
}

/// Whether a multipart content type is an accepted image type.
#[must_use]
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.trim()
            .to_ascii_lowercase()
            .strip_prefix("image/")
            .is_some_and(|subtype| !subtype.is_empty())
    })
}

/// Build a collision-resistant stored name for an upload.
#[must_use]
pub fn generate_filename(original_name: &str) -> String {
    let mut tag = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut tag);
    format!(
        "{}_{}_{}",
        Utc::now().timestamp_millis(),
        hex::encode(tag),
        sanitize_filename(original_name)
    )
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Store files under `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, BlobError> {
        let is_plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && filename != "..";
        if !is_plain {
            return Err(BlobError::InvalidName(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let filename = generate_filename(original_name);
        let path = self.path_for(&filename)?;
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(filename = %filename, size = bytes.len(), "Stored upload");
        Ok(filename)
    }

    async fn delete(&self, filename: &str) -> Result<(), BlobError> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(filename = %filename, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_image_content_types() {
        assert!(is_image_content_type(Some("image/png")));
        assert!(is_image_content_type(Some("IMAGE/JPEG")));
        assert!(!is_image_content_type(Some("image/")));
        assert!(!is_image_content_type(Some("text/plain")));
        assert!(!is_image_content_type(Some("application/octet-stream")));
        assert!(!is_image_content_type(None));
    }

    #[test]
    fn test_generated_names_are_unique_and_safe() {
        let a = generate_filename("../../etc/passwd");
        let b = generate_filename("../../etc/passwd");
        assert_ne!(a, b);
        assert!(a.ends_with("_passwd"));
        assert!(!a.contains('/'));
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(dir.path().join("uploads")).unwrap();

        let name = store.save("photo.png", b"\x89PNG").await.unwrap();
        let path = store.root().join(&name);
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");

        store.delete(&name).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(store.delete(&name).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(dir.path()).unwrap();
        for name in ["", "..", "../x", "a/b", ".hidden"] {
            assert!(matches!(store.delete(name).await, Err(BlobError::InvalidName(_))));
        }
    }
}
