//! Startup storage setup tests.
//!
//! Run with: `cargo test -p filehub-api --test setup_test`

mod helpers;

use filehub_api::setup::storage::setup_storage;
use filehub_core::constants::FILESYSTEM_BUCKET;
use filehub_core::models::{FileCategory, NewFileRecord};
use filehub_db::{FileMetadataStore, InMemoryFileMetadataStore};
use filehub_storage::FileStorage;
use helpers::test_config;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

async fn store_with_orphan_row() -> (Arc<InMemoryFileMetadataStore>, String) {
    let store = Arc::new(InMemoryFileMetadataStore::new());
    let owner = Uuid::new_v4();
    let key = format!("{}/{}_gone.pdf", owner, Uuid::new_v4());
    store
        .insert(NewFileRecord {
            user_id: owner,
            original_filename: "gone.pdf".to_string(),
            stored_filename: key.clone(),
            content_type: "application/pdf".to_string(),
            file_type: FileCategory::Pdf,
            size: 10,
            bucket_name: FILESYSTEM_BUCKET.to_string(),
        })
        .await
        .unwrap();
    (store, key)
}

#[tokio::test]
async fn test_startup_reconcile_removes_orphan_rows() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_str().unwrap(), 1024);
    config.0.reconcile_on_startup = true;
    let (store, _key) = store_with_orphan_row().await;

    let storage = setup_storage(&config, store.clone()).await.unwrap();

    assert_eq!(storage.bucket_name(), FILESYSTEM_BUCKET);
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn test_startup_without_reconcile_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_str().unwrap(), 1024);
    let (store, key) = store_with_orphan_row().await;

    setup_storage(&config, store.clone()).await.unwrap();

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].stored_filename, key);
}
