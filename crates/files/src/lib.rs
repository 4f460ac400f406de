//! Expediente Blob Storage
//!
//! Binary content collaborator for the expediente record system.
//!
//! ## Design Principles
//!
//! - Semantic data (validated documents) and binary bytes are deliberately
//!   separated: documents live in the document store, bytes live here
//! - Blobs are immutable once stored (new content creates a new blob)
//! - References from documents to blobs are explicit string keys
//! - Documents remain valid even when their binary content is absent
//!
//! ## Storage Model
//!
//! The local implementation is content-addressed: a blob is stored under its
//! SHA-256 hash with two-level sharding to keep directories small:
//!
//! ```text
//! <root>/
//! └── sha256/
//!     └── ab/
//!         └── ab3f9e…   # full hash as filename
//! ```
//!
//! Content addressing gives deduplication (identical uploads store once),
//! integrity (bytes can be verified against their key) and deterministic
//! paths. The core treats this crate purely through the [`BlobStore`] trait;
//! an S3-backed implementation would slot in behind the same contract.

mod blob;

pub use blob::{BlobMetadata, LocalBlobStore};

use async_trait::async_trait;

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Root directory does not exist or is not a directory
    #[error("invalid blob root directory: {0}")]
    InvalidRootDirectory(String),

    /// No blob is stored under the requested key
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The requested key is not a well-formed content hash
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// The blob-store contract consumed by the file service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the given bytes and returns their metadata (including the key).
    ///
    /// Storing bytes that already exist is idempotent: the existing blob is
    /// left untouched and its metadata returned.
    async fn put(&self, bytes: &[u8]) -> BlobResult<BlobMetadata>;

    /// Retrieves the bytes stored under the given key.
    async fn get(&self, key: &str) -> BlobResult<Vec<u8>>;

    /// Deletes the blob stored under the given key, if present.
    async fn delete(&self, key: &str) -> BlobResult<()>;
}
