//! Database repositories for the data access layer
//!
//! Each store is a trait so the storage and HTTP crates can be exercised
//! without Postgres. The `Pg*` types are the production implementations;
//! `memory` holds in-process doubles behind the `test-utils` feature.

pub mod file_metadata;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod user;

pub use file_metadata::{FileMetadataRow, FileMetadataStore, PgFileMetadataRepository};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{InMemoryFileMetadataStore, InMemoryUserStore};
pub use user::{PgUserRepository, UserRow, UserStore};
