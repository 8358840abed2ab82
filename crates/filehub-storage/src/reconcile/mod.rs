//! Metadata index kept alongside physical storage.
//!
//! Backends record every stored object here and remove the row after a
//! physical delete. The index also turns bare names supplied by clients back
//! into full keys.

mod sweep;

pub use sweep::{ReconcileReport, Reconciler};

use std::sync::Arc;

use filehub_core::models::{FileCategory, FileRecord, NewFileRecord};
use filehub_db::FileMetadataStore;
use uuid::Uuid;

use crate::keys;
use crate::traits::{StorageError, StorageResult};

/// Category recorded for a content type. Unknown types are recorded as PDF.
pub fn categorize(content_type: &str) -> FileCategory {
    FileCategory::from_content_type(content_type).unwrap_or_else(|| {
        tracing::warn!(
            content_type = %content_type,
            "Unrecognized content type, recording file as PDF"
        );
        FileCategory::Pdf
    })
}

#[derive(Clone)]
pub struct MetadataIndex {
    store: Arc<dyn FileMetadataStore>,
}

impl MetadataIndex {
    pub fn new(store: Arc<dyn FileMetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FileMetadataStore> {
        &self.store
    }

    /// Insert the row for a freshly stored object.
    pub async fn record_upload(
        &self,
        owner: Uuid,
        key: &str,
        original_filename: &str,
        content_type: &str,
        size: u64,
        bucket: &str,
    ) -> StorageResult<FileRecord> {
        let record = NewFileRecord {
            user_id: owner,
            original_filename: original_filename.to_string(),
            stored_filename: key.to_string(),
            content_type: content_type.to_string(),
            file_type: categorize(content_type),
            size: i64::try_from(size).unwrap_or(i64::MAX),
            bucket_name: bucket.to_string(),
        };
        Ok(self.store.insert(record).await?)
    }

    /// Remove rows of `owner` stored under any of `names`.
    ///
    /// Failures are logged and skipped; the reconciliation sweep removes
    /// whatever is left behind.
    pub async fn forget(&self, owner: Uuid, names: &[&str]) -> u64 {
        let mut removed = 0;
        for name in names {
            let result = match self.store.find_by_stored_filename(name).await {
                Ok(Some(record)) if record.user_id == owner => {
                    self.store.delete_by_stored_filename(name).await
                }
                Ok(_) => Ok(0),
                Err(e) => Err(e),
            };
            match result {
                Ok(count) => removed += count,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        owner_id = %owner,
                        key = %name,
                        "Failed to delete file metadata"
                    );
                }
            }
        }
        removed
    }

    /// Full key of `owner`'s file named `file_name`.
    ///
    /// Owner-prefixed names are taken as is. A bare name is looked up
    /// exactly, then (when it starts with a token) among the owner's keys
    /// containing it. With no match the name is assumed to live under the
    /// owner prefix.
    pub async fn resolve_key(&self, owner: Uuid, file_name: &str) -> StorageResult<String> {
        let bare = keys::bare_name_for_owner(owner, file_name)?;
        if keys::owner_prefix(file_name).is_some() {
            return Ok(keys::full_key(owner, &bare));
        }

        // Rows stored under the bare name still describe an object under the owner prefix
        if let Some(record) = self.store.find_by_stored_filename(&bare).await? {
            if record.user_id == owner {
                return Ok(keys::full_key(owner, &bare));
            }
        }

        let (token, _) = keys::split_stored_name(&bare);
        if keys::is_token(token) {
            let mut matches = self
                .store
                .find_by_user_and_stored_filename_containing(owner, &bare)
                .await?;
            match matches.len() {
                0 => {}
                1 => {
                    let record = matches.remove(0);
                    tracing::debug!(
                        owner_id = %owner,
                        file_name = %bare,
                        key = %record.stored_filename,
                        "Resolved bare file name from metadata"
                    );
                    return Ok(record.stored_filename);
                }
                n => {
                    return Err(StorageError::AmbiguousReference {
                        name: bare,
                        matches: n,
                    })
                }
            }
        }

        tracing::warn!(
            owner_id = %owner,
            file_name = %bare,
            "No metadata for file name, using owner prefix"
        );
        Ok(keys::full_key(owner, &bare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filehub_db::InMemoryFileMetadataStore;

    async fn index_with(records: &[(Uuid, &str)]) -> MetadataIndex {
        let store = Arc::new(InMemoryFileMetadataStore::new());
        let index = MetadataIndex::new(store);
        for (owner, key) in records {
            index
                .record_upload(*owner, key, "report.pdf", "application/pdf", 10, "files")
                .await
                .unwrap();
        }
        index
    }

    #[test]
    fn test_categorize_defaults_to_pdf() {
        assert_eq!(categorize("image/png"), FileCategory::Png);
        assert_eq!(categorize("image/jpeg; charset=binary"), FileCategory::Jpg);
        assert_eq!(categorize("text/plain"), FileCategory::Pdf);
    }

    #[tokio::test]
    async fn test_resolve_bare_name_from_metadata() {
        let owner = Uuid::new_v4();
        let token = Uuid::new_v4();
        let key = format!("{}/{}_report.pdf", owner, token);
        let index = index_with(&[(owner, &key)]).await;

        let resolved = index
            .resolve_key(owner, &format!("{}_report.pdf", token))
            .await
            .unwrap();
        assert_eq!(resolved, key);
    }

    #[tokio::test]
    async fn test_resolve_bare_row_maps_under_owner_prefix() {
        let owner = Uuid::new_v4();
        let bare = format!("{}_report.pdf", Uuid::new_v4());
        let index = index_with(&[(owner, &bare)]).await;

        let resolved = index.resolve_key(owner, &bare).await.unwrap();
        assert_eq!(resolved, format!("{}/{}", owner, bare));
    }

    #[tokio::test]
    async fn test_resolve_ignores_other_owners_rows() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let token = Uuid::new_v4();
        let bare = format!("{}_report.pdf", token);
        let index = index_with(&[(owner, &format!("{}/{}", owner, bare))]).await;

        let resolved = index.resolve_key(intruder, &bare).await.unwrap();
        assert_eq!(resolved, format!("{}/{}", intruder, bare));
    }

    #[tokio::test]
    async fn test_resolve_rejects_foreign_prefix() {
        let owner = Uuid::new_v4();
        let index = index_with(&[]).await;
        let foreign = format!("{}/x_report.pdf", Uuid::new_v4());
        assert!(matches!(
            index.resolve_key(owner, &foreign).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_matches() {
        let owner = Uuid::new_v4();
        let token = Uuid::new_v4();
        let index = index_with(&[
            (owner, &format!("{}/{}_report.pdf", owner, token)),
            (owner, &format!("{}/{}_report.pdf.bak", owner, token)),
        ])
        .await;

        let err = index
            .resolve_key(owner, &format!("{}_report.pdf", token))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::AmbiguousReference { matches: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_forget_only_removes_own_rows() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let key = format!("{}/t_report.pdf", owner);
        let index = index_with(&[(owner, &key)]).await;

        assert_eq!(index.forget(other, &[&key]).await, 0);
        assert_eq!(index.forget(owner, &[&key, "t_report.pdf"]).await, 1);
        assert!(index
            .store()
            .find_by_stored_filename(&key)
            .await
            .unwrap()
            .is_none());
    }
}
