//! # Expediente Store
//!
//! Document-store collaborator contract for the expediente record system.
//!
//! The core crates never talk to a concrete database. They talk to the
//! [`DocumentStore`] trait: find/update/delete by id plus a small query
//! predicate language ([`Predicate`]) that supports nested array
//! element-match queries and type-cast sort keys ([`SortKey`]). Any backend
//! that can answer those seven calls can sit behind the system.
//!
//! [`memory::MemoryStore`] is the in-process reference implementation used
//! by tests and the development server.
//!
//! **No business logic**: template rules, ownership checks and field
//! validation belong in `expediente-core`. This crate only stores and
//! matches JSON documents.

pub mod memory;
pub mod predicate;

pub use predicate::{
    CastKind, CmpOp, Comparand, Predicate, Query, SortDirection, SortKey, SortTarget, TextMode,
};

use async_trait::async_trait;
use serde_json::Value;

/// Errors surfaced by document-store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A stored value could not be cast to the type a predicate or sort key requires
    #[error("cannot cast value at '{path}' to {expected}")]
    Cast { path: String, expected: &'static str },
    /// A document with the same id already exists in the collection
    #[error("duplicate document id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },
    /// The backend failed in a way the caller cannot act on
    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The document-store contract consumed by the core engines.
///
/// Documents are self-describing JSON values; each carries its own `id`
/// field and is additionally keyed by that id within its collection.
/// Single-document writes are atomic; there is no cross-document
/// transaction and no optimistic concurrency token (last write wins).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document under the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if a document with this id
    /// already exists in the collection.
    async fn insert(&self, collection: &str, id: &str, document: Value) -> StoreResult<()>;

    /// Returns the document with the given id, if present.
    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Returns the first document matching the predicate, if any.
    async fn find_one(&self, collection: &str, predicate: &Predicate)
        -> StoreResult<Option<Value>>;

    /// Runs a full query: predicate, composite sort, skip and limit.
    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Value>>;

    /// Counts documents matching the predicate, ignoring any result window.
    async fn count(&self, collection: &str, predicate: &Predicate) -> StoreResult<u64>;

    /// Replaces the document with the given id. Returns `false` if absent.
    async fn update_by_id(&self, collection: &str, id: &str, document: Value)
        -> StoreResult<bool>;

    /// Deletes the document with the given id. Returns `false` if absent.
    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool>;
}
