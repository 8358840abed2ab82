#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::MetadataIndex;
#[cfg(feature = "storage-s3")]
use crate::{S3Settings, S3Storage};
use crate::{FileStorage, StorageBackend, StorageError, StorageResult};
use filehub_core::Config;
use std::sync::Arc;

/// Create the storage backend selected by configuration.
///
/// S3 is used only when `STORAGE_BACKEND` selects it and `S3_ENABLED` is set;
/// every other combination gets the filesystem backend.
pub async fn create_storage(
    config: &Config,
    metadata: MetadataIndex,
) -> StorageResult<Arc<dyn FileStorage>> {
    let backend = config.effective_storage_backend();
    if backend != config.storage_backend() {
        tracing::warn!(
            requested = %config.storage_backend(),
            "S3 storage requested but S3_ENABLED is false, using local storage"
        );
    }

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::BackendUnavailable("S3_BUCKET not configured".to_string())
                })?;
            let region = config
                .s3_region()
                .or_else(|| config.aws_region())
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::BackendUnavailable(
                        "S3_REGION or AWS_REGION not configured".to_string(),
                    )
                })?;

            let settings = S3Settings {
                bucket,
                region,
                endpoint_url: config.s3_endpoint().map(String::from),
                access_key_id: config.s3_access_key_id().map(String::from),
                secret_access_key: config.s3_secret_access_key().map(String::from),
            };
            let storage = S3Storage::new(settings, metadata).await?;
            storage.ensure_bucket().await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::BackendUnavailable(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path(), metadata).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::BackendUnavailable(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use filehub_core::config::{BaseConfig, FileServiceConfig};
    use filehub_db::InMemoryFileMetadataStore;

    fn config(root: &std::path::Path, backend: StorageBackend, s3_enabled: bool) -> Config {
        Config(Box::new(FileServiceConfig {
            base: BaseConfig {
                server_port: 8080,
                cors_origins: vec!["http://localhost:3000".to_string()],
                db_max_connections: 5,
                db_timeout_seconds: 5,
                jwt_secret: "x".repeat(32),
                jwt_expiry_hours: 24,
                environment: "test".to_string(),
            },
            database_url: "postgres://localhost/filehub".to_string(),
            storage_backend: backend,
            s3_enabled,
            local_storage_path: root.display().to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            max_file_size_bytes: 1024,
            allowed_content_types: vec!["application/pdf".to_string()],
            reconcile_on_startup: false,
        }))
    }

    #[tokio::test]
    async fn test_s3_requested_but_disabled_uses_local() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = MetadataIndex::new(Arc::new(InMemoryFileMetadataStore::new()));

        let storage = create_storage(&config(dir.path(), StorageBackend::S3, false), metadata)
            .await
            .unwrap();

        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert_eq!(storage.bucket_name(), filehub_core::constants::FILESYSTEM_BUCKET);
    }
}
