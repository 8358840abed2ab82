//! Storage backend setup and the optional startup reconciliation pass

use anyhow::{Context, Result};
use filehub_core::Config;
use filehub_db::FileMetadataStore;
use filehub_storage::{create_storage, FileStorage, MetadataIndex, Reconciler};
use std::sync::Arc;

/// Build the configured backend and, when enabled, reconcile it with the metadata rows.
pub async fn setup_storage(
    config: &Config,
    metadata: Arc<dyn FileMetadataStore>,
) -> Result<Arc<dyn FileStorage>> {
    let storage = create_storage(config, MetadataIndex::new(metadata.clone()))
        .await
        .context("Failed to initialize storage backend")?;

    tracing::info!(
        backend = %storage.backend_type(),
        bucket = %storage.bucket_name(),
        "Storage backend ready"
    );

    if config.reconcile_on_startup() {
        Reconciler::new(storage.clone(), metadata)
            .run()
            .await
            .context("Startup reconciliation failed")?;
    }

    Ok(storage)
}
