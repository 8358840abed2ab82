use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use filehub_db::FileMetadataStore;

use crate::traits::{FileStorage, StorageResult};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub physical_objects: usize,
    pub metadata_rows: usize,
    /// Rows deleted because their object is gone
    pub removed_rows: Vec<String>,
    /// Objects without a row; reported, never deleted
    pub unindexed_objects: Vec<String>,
}

/// Compares the active backend with the metadata rows of its bucket.
pub struct Reconciler {
    storage: Arc<dyn FileStorage>,
    metadata: Arc<dyn FileMetadataStore>,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn FileStorage>, metadata: Arc<dyn FileMetadataStore>) -> Self {
        Self { storage, metadata }
    }

    pub async fn run(&self) -> StorageResult<ReconcileReport> {
        let start = Instant::now();
        let bucket = self.storage.bucket_name();

        let physical: HashSet<String> = self.storage.all_keys().await?.into_iter().collect();
        let indexed: HashSet<String> = self
            .metadata
            .stored_filenames_in_bucket(bucket)
            .await?
            .into_iter()
            .collect();

        let mut report = ReconcileReport {
            physical_objects: physical.len(),
            metadata_rows: indexed.len(),
            ..Default::default()
        };

        for key in indexed.difference(&physical) {
            self.metadata.delete_by_stored_filename(key).await?;
            tracing::info!(bucket = %bucket, key = %key, "Removed metadata row without object");
            report.removed_rows.push(key.clone());
        }

        for key in physical.difference(&indexed) {
            tracing::warn!(bucket = %bucket, key = %key, "Stored object has no metadata row");
            report.unindexed_objects.push(key.clone());
        }

        report.removed_rows.sort();
        report.unindexed_objects.sort();

        tracing::info!(
            bucket = %bucket,
            physical_objects = report.physical_objects,
            metadata_rows = report.metadata_rows,
            removed_rows = report.removed_rows.len(),
            unindexed_objects = report.unindexed_objects.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage reconciliation finished"
        );

        Ok(report)
    }
}
