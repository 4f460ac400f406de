//! Local content-addressed blob store implementation.
//!
//! The service is stateless: the constructor only validates the root
//! directory, and every operation recomputes paths from the blob key. All
//! keys are lowercase SHA-256 hex digests; anything else is rejected before
//! touching the filesystem, which also rules out path traversal through
//! the key.

use crate::{BlobError, BlobResult, BlobStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for a stored blob.
///
/// Contains everything a document needs to reference the blob: its
/// content-hash key, size, and best-effort media type. No patient or
/// clinical identifiers appear here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    /// Hashing algorithm used (always "sha256" for the current implementation)
    pub hash_algorithm: String,

    /// Hexadecimal SHA-256 digest of the content; doubles as the blob key
    pub key: String,

    /// Size of the content in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// Best-effort detection from magic bytes; not authoritative.
    pub media_type: Option<String>,

    /// UTC timestamp when the blob was stored
    pub stored_at: DateTime<Utc>,
}

/// Filesystem-backed [`BlobStore`] with content-addressed layout.
#[derive(Debug)]
pub struct LocalBlobStore {
    root_directory: PathBuf,
}

fn is_valid_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl LocalBlobStore {
    /// Creates a blob store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::InvalidRootDirectory` if the path exists but is
    /// not a directory, or cannot be created or canonicalised.
    pub fn new(root_directory: &Path) -> BlobResult<Self> {
        if !root_directory.exists() {
            fs::create_dir_all(root_directory).map_err(|e| {
                BlobError::InvalidRootDirectory(format!(
                    "cannot create {}: {}",
                    root_directory.display(),
                    e
                ))
            })?;
        }

        if !root_directory.is_dir() {
            return Err(BlobError::InvalidRootDirectory(format!(
                "path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            BlobError::InvalidRootDirectory(format!(
                "cannot canonicalize {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Storage path for a key: `<root>/sha256/<first two chars>/<key>`.
    fn storage_path(&self, key: &str) -> PathBuf {
        self.root_directory.join("sha256").join(&key[..2]).join(key)
    }

    fn checked_path(&self, key: &str) -> BlobResult<PathBuf> {
        if !is_valid_key(key) {
            return Err(BlobError::InvalidKey(key.to_owned()));
        }
        Ok(self.storage_path(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: &[u8]) -> BlobResult<BlobMetadata> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let key = hex::encode(hasher.finalize());

        let storage_path = self.storage_path(&key);

        // Identical content is already stored; content addressing makes
        // this a no-op rather than an error.
        if !storage_path.exists() {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&storage_path, bytes)?;
        }

        let media_type = infer::get(bytes).map(|kind| kind.mime_type().to_owned());

        Ok(BlobMetadata {
            hash_algorithm: "sha256".to_owned(),
            key,
            size_bytes: bytes.len() as u64,
            media_type,
            stored_at: Utc::now(),
        })
    }

    async fn get(&self, key: &str) -> BlobResult<Vec<u8>> {
        let storage_path = self.checked_path(key)?;
        if !storage_path.is_file() {
            return Err(BlobError::NotFound(key.to_owned()));
        }
        Ok(fs::read(&storage_path)?)
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let storage_path = self.checked_path(key)?;
        if !storage_path.is_file() {
            return Err(BlobError::NotFound(key.to_owned()));
        }
        fs::remove_file(&storage_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalBlobStore) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalBlobStore::new(temp_dir.path()).expect("new should succeed");
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_bytes() {
        let (_guard, store) = store();
        let bytes = b"informe de laboratorio";

        let metadata = store.put(bytes).await.expect("put should succeed");
        assert_eq!(metadata.hash_algorithm, "sha256");
        assert_eq!(metadata.size_bytes, bytes.len() as u64);

        let read_back = store.get(&metadata.key).await.expect("get should succeed");
        assert_eq!(read_back, bytes);
    }

    #[tokio::test]
    async fn test_put_is_idempotent_for_identical_content() {
        let (_guard, store) = store();
        let first = store.put(b"same bytes").await.expect("put should succeed");
        let second = store.put(b"same bytes").await.expect("second put should succeed");
        assert_eq!(first.key, second.key);
    }

    #[tokio::test]
    async fn test_put_detects_media_type_from_magic_bytes() {
        let (_guard, store) = store();
        // Minimal PDF header is enough for magic-byte sniffing.
        let metadata = store
            .put(b"%PDF-1.4 minimal")
            .await
            .expect("put should succeed");
        assert_eq!(metadata.media_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_not_found() {
        let (_guard, store) = store();
        let key = "a".repeat(64);
        let err = store.get(&key).await.expect_err("unknown key should fail");
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_key_is_rejected_before_filesystem_access() {
        let (_guard, store) = store();
        let err = store
            .get("../../../etc/passwd")
            .await
            .expect_err("traversal-shaped key should be rejected");
        assert!(matches!(err, BlobError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_blob() {
        let (_guard, store) = store();
        let metadata = store.put(b"ephemeral").await.expect("put should succeed");

        store
            .delete(&metadata.key)
            .await
            .expect("delete should succeed");
        let err = store
            .get(&metadata.key)
            .await
            .expect_err("deleted blob should be gone");
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_storage_uses_two_level_sharding() {
        let (guard, store) = store();
        let metadata = store.put(b"sharded").await.expect("put should succeed");

        let expected = guard
            .path()
            .canonicalize()
            .unwrap()
            .join("sha256")
            .join(&metadata.key[..2])
            .join(&metadata.key);
        assert!(expected.is_file(), "blob should live at the sharded path");
    }
}
