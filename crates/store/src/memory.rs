//! In-process document store.
//!
//! `MemoryStore` keeps every collection as an id-keyed map of JSON
//! documents behind a single `tokio::sync::RwLock`. It exists so the core
//! engines and their tests can run without an external database; the
//! predicate language is evaluated here exactly as a remote backend would
//! evaluate it.
//!
//! Writes replace whole documents, which gives the per-document atomicity
//! the concurrency model assumes: a reader sees either the old or the new
//! document, never a partial mutation.

use crate::predicate::{compare_comparands, Comparand, Predicate, Query, SortDirection};
use crate::{DocumentStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Collection = BTreeMap<String, Value>;

/// In-memory [`DocumentStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_keys(a: &[Option<Comparand>], b: &[Option<Comparand>], query: &Query) -> Ordering {
    for (index, key) in query.sort.iter().enumerate() {
        let ordering = match (&a[index], &b[index]) {
            (Some(x), Some(y)) => compare_comparands(x, y),
            // Missing values sort last regardless of direction.
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, id: &str, document: Value) -> StoreResult<()> {
        let mut guard = self.collections.write().await;
        let coll = guard.entry(collection.to_owned()).or_default();
        if coll.contains_key(id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_owned(),
                id: id.to_owned(),
            });
        }
        coll.insert(id.to_owned(), document);
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let guard = self.collections.read().await;
        Ok(guard.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn find_one(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> StoreResult<Option<Value>> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(None);
        };
        for document in coll.values() {
            if predicate.matches(document)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Value>> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for document in coll.values() {
            if query.predicate.matches(document)? {
                matched.push(document.clone());
            }
        }

        if !query.sort.is_empty() {
            let mut keyed: Vec<(Vec<Option<Comparand>>, Value)> = matched
                .into_iter()
                .map(|doc| {
                    let keys = query.sort.iter().map(|k| k.extract(&doc)).collect();
                    (keys, doc)
                })
                .collect();
            keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, query));
            matched = keyed.into_iter().map(|(_, doc)| doc).collect();
        }

        let skipped = matched.into_iter().skip(query.skip as usize);
        let windowed: Vec<Value> = match query.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        };
        Ok(windowed)
    }

    async fn count(&self, collection: &str, predicate: &Predicate) -> StoreResult<u64> {
        let guard = self.collections.read().await;
        let Some(coll) = guard.get(collection) else {
            return Ok(0);
        };
        let mut count = 0u64;
        for document in coll.values() {
            if predicate.matches(document)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> StoreResult<bool> {
        let mut guard = self.collections.write().await;
        match guard.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(slot) => {
                *slot = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut guard = self.collections.write().await;
        Ok(guard
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }
}
