//! In-memory document store.
//!
//! Not durable: all state is lost on restart. Used when the storefront runs
//! with `SHOPFRONT_BACKEND=memory` and by tests, which also use the failure
//! switches and the write counter to observe side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, Fields, StoreError};

/// Document store backed by a `HashMap` keyed by `(collection, key)`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Document>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting it as a write.
    pub async fn insert(&self, collection: &str, key: &str, document: Document) {
        self.documents
            .write()
            .await
            .insert((collection.to_owned(), key.to_owned()), document);
    }

    /// Read a document without going through the trait (never fails).
    pub async fn snapshot(&self, collection: &str, key: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Number of `set`/`merge` calls that reached the store.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail with `StoreError::Unavailable`.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_owned()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_owned()));
        }
        Ok(self.snapshot(collection, key).await)
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        document: Document,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.insert(collection, key, document).await;
        Ok(())
    }

    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_writable()?;
        self.documents
            .write()
            .await
            .entry((collection.to_owned(), key.to_owned()))
            .or_default()
            .merge(fields);
        Ok(())
    }
}
