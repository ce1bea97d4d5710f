//! Remote document store.
//!
//! # Architecture
//!
//! - The store is an external collaborator: we only read one document by key
//!   and write/merge one document by key.
//! - Documents are flat maps of typed [`FieldValue`]s, the same model the
//!   Firestore REST API exposes.
//! - There are no transactions. Concurrent merges of the same fields are
//!   last-write-wins.
//!
//! # Backends
//!
//! - [`FirestoreClient`] - Firestore REST API (production, emulator)
//! - [`MemoryDocumentStore`] - in-process map for local development and tests

mod firestore;
mod memory;

pub use firestore::FirestoreClient;
pub use memory::MemoryDocumentStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Field map of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed value inside a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if this is a timestamp.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// A document read from or written to the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: Fields,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Create a document from a field map.
    #[must_use]
    pub const fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    /// Get a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Get a string field by name. Non-string values yield `None`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// Get a timestamp field by name. Non-timestamp values yield `None`.
    #[must_use]
    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }

    /// Overwrite the named fields, keeping all others.
    pub fn merge(&mut self, fields: Fields) {
        self.fields.extend(fields);
    }

    /// Borrow all fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consume the document and return its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the request.
    #[error("document store returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the store.
        message: String,
    },

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A stored document has an unexpected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store is unreachable or refused to serve the request.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to one-document-by-key in a named collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. Returns `None` when it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, key: &str, document: Document)
    -> Result<(), StoreError>;

    /// Overwrite only the given fields, creating the document if missing.
    async fn merge(&self, collection: &str, key: &str, fields: Fields) -> Result<(), StoreError>;
}
