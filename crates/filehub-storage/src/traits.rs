//! Storage abstraction trait
//!
//! This module defines the FileStorage trait that both backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filehub_core::models::{ListPage, ListQuery};
use filehub_core::AppError;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Refusing to store an empty file")]
    EmptyInput,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("File name '{name}' matches {matches} stored files")]
    AmbiguousReference { name: String, matches: usize },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Metadata store error: {0}")]
    Metadata(#[from] AppError),

    #[error("{context}")]
    Fault {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    pub fn fault(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StorageError::Fault {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Lazy byte stream returned by reads.
pub type FileStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Outcome of a successful store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Full owner-prefixed key, as recorded in metadata
    pub key: String,
    /// Name the client passes back to read and delete
    pub file_name: String,
    pub size: u64,
    pub content_type: String,
}

/// File storage abstraction
///
/// One implementation is selected at startup and serves every request. All
/// operations are scoped to an owner; `file_name` may be the bare
/// `{token}_{original}` name or the full owner-prefixed key.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` as a new file of `owner` and record its metadata.
    async fn store(
        &self,
        owner: Uuid,
        data: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> StorageResult<StoredFile>;

    /// Open a file for streaming.
    async fn read(&self, owner: Uuid, file_name: &str) -> StorageResult<FileStream>;

    /// Remove a file and its metadata row.
    async fn delete(&self, owner: Uuid, file_name: &str) -> StorageResult<()>;

    /// One page of the owner's files, filtered and sorted.
    async fn list(&self, owner: Uuid, query: &ListQuery) -> StorageResult<ListPage>;

    /// Number of the owner's files matching `search`.
    async fn count(&self, owner: Uuid, search: Option<&str>) -> StorageResult<u64>;

    /// Every full key held by the backend, across owners.
    async fn all_keys(&self) -> StorageResult<Vec<String>>;

    /// Bucket name written to metadata rows
    fn bucket_name(&self) -> &str;

    fn backend_type(&self) -> StorageBackend;
}
