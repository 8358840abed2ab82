//! Filehub Storage Library
//!
//! Storage abstraction for user-owned files with two interchangeable backends:
//! a local filesystem tree and an S3-compatible bucket.
//!
//! # Storage key format
//!
//! Every file lives under its owner: `{owner_id}/{token}_{original_filename}`,
//! where `token` is a random UUID. The filesystem backend maps the owner
//! segment to a directory; the S3 backend uses the full key as object name.
//! Key handling is centralized in the `keys` module so both backends agree.
//!
//! Each physical write is mirrored into the metadata index (`reconcile`), which
//! also resolves bare file names back to full keys and repairs drift between
//! the two on demand.

pub mod content_type;
pub mod factory;
pub mod keys;
pub mod listing;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod reconcile;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filehub_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use reconcile::{MetadataIndex, ReconcileReport, Reconciler};
#[cfg(feature = "storage-s3")]
pub use s3::{S3Settings, S3Storage};
pub use traits::{FileStorage, FileStream, StorageError, StorageResult, StoredFile};
