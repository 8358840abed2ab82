use crate::content_type;
use crate::keys;
use crate::listing::{Candidate, PageCollector, SearchFilter};
use crate::reconcile::MetadataIndex;
use crate::traits::{FileStorage, FileStream, StorageError, StorageResult, StoredFile};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Object};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filehub_core::models::{FileEntry, ListPage, ListQuery};
use futures::StreamExt;
use tokio::sync::OnceCell;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (e.g. MinIO)
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    metadata: MetadataIndex,
    bucket_ready: std::sync::Arc<OnceCell<()>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Static credentials are used when both halves are configured; otherwise
    /// the default AWS provider chain applies.
    pub async fn new(settings: S3Settings, metadata: MetadataIndex) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(settings.region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);
        if let (Some(key_id), Some(secret)) = (
            settings.access_key_id.as_deref(),
            settings.secret_access_key.as_deref(),
        ) {
            s3_config_builder = s3_config_builder.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "filehub-config",
            ));
        }
        if let Some(ref endpoint) = settings.endpoint_url {
            // S3-compatible providers need path-style addressing
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }
        let client = Client::from_conf(s3_config_builder.retry_config(retry_config).build());

        tracing::info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = settings.endpoint_url.as_deref().unwrap_or("aws"),
            "S3 storage configured"
        );

        Ok(Self::with_client(
            client,
            settings.bucket,
            settings.region,
            metadata,
        ))
    }

    /// Wrap an already configured client.
    pub fn with_client(
        client: Client,
        bucket: impl Into<String>,
        region: impl Into<String>,
        metadata: MetadataIndex,
    ) -> Self {
        S3Storage {
            client,
            bucket: bucket.into(),
            region: region.into(),
            metadata,
            bucket_ready: std::sync::Arc::new(OnceCell::new()),
        }
    }

    /// Make sure the bucket exists, creating it on first use.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        self.bucket_ready
            .get_or_try_init(|| async {
                match self.client.head_bucket().bucket(&self.bucket).send().await {
                    Ok(_) => return Ok(()),
                    Err(SdkError::ServiceError(service_err))
                        if matches!(service_err.err(), HeadBucketError::NotFound(_)) => {}
                    Err(e) => return Err(self.sdk_error("check bucket", e)),
                }

                let mut request = self.client.create_bucket().bucket(&self.bucket);
                if self.region != "us-east-1" {
                    request = request.create_bucket_configuration(
                        CreateBucketConfiguration::builder()
                            .location_constraint(BucketLocationConstraint::from(
                                self.region.as_str(),
                            ))
                            .build(),
                    );
                }
                match request.send().await {
                    Ok(_) => {
                        tracing::info!(bucket = %self.bucket, "Created S3 bucket");
                        Ok(())
                    }
                    Err(SdkError::ServiceError(service_err))
                        if matches!(
                            service_err.err(),
                            CreateBucketError::BucketAlreadyOwnedByYou(_)
                        ) =>
                    {
                        Ok(())
                    }
                    Err(e) => Err(self.sdk_error("create bucket", e)),
                }
            })
            .await
            .map(|_| ())
    }

    /// Map an SDK failure: transport problems mean the backend is unavailable.
    fn sdk_error<E, R>(&self, operation: &str, e: SdkError<E, R>) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug,
    {
        let detail = DisplayErrorContext(&e).to_string();
        tracing::error!(
            bucket = %self.bucket,
            operation = operation,
            error = %detail,
            "S3 request failed"
        );
        match e {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                StorageError::BackendUnavailable(format!("S3 {} failed: {}", operation, detail))
            }
            _ => StorageError::fault(format!("S3 {} failed", operation), detail),
        }
    }

    fn owner_prefix(owner: Uuid) -> String {
        format!("{}/", owner)
    }

    /// Feed every object under `prefix` to `sink`, one result page at a time.
    async fn scan_prefix<F>(&self, prefix: &str, mut sink: F) -> StorageResult<()>
    where
        F: FnMut(&Object),
    {
        self.ensure_bucket().await?;

        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| self.sdk_error("list objects", e))?;

            for object in page.contents() {
                sink(object);
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
            {
                Ok(false)
            }
            Err(e) => Err(self.sdk_error("head object", e)),
        }
    }
}

/// Listing candidate for an object under `owner`'s prefix.
fn candidate_from_object(owner: Uuid, object: &Object) -> Option<Candidate> {
    let key = object.key()?;
    let bare = key.strip_prefix(&S3Storage::owner_prefix(owner))?;
    if bare.is_empty() || bare.ends_with('/') {
        return None;
    }
    let created = object
        .last_modified()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now);
    let size = object.size().unwrap_or(0).max(0) as u64;
    Some(Candidate::new(key.to_string(), bare, size, created))
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn store(
        &self,
        owner: Uuid,
        data: Bytes,
        original_filename: &str,
        content_type: &str,
    ) -> StorageResult<StoredFile> {
        if data.is_empty() {
            return Err(StorageError::EmptyInput);
        }
        keys::validate_original_filename(original_filename)?;
        self.ensure_bucket().await?;

        let key = keys::derive_key(owner, original_filename);
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_length(size as i64)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| self.sdk_error("upload", e))?;

        if let Err(e) = self
            .metadata
            .record_upload(owner, &key, original_filename, content_type, size, &self.bucket)
            .await
        {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                "Metadata insert failed, removing uploaded object"
            );
            if let Err(delete_err) = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                tracing::error!(
                    error = %DisplayErrorContext(&delete_err),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to remove object after metadata failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            bucket = %self.bucket,
            owner_id = %owner,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredFile {
            file_name: key.clone(),
            key,
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn read(&self, owner: Uuid, file_name: &str) -> StorageResult<FileStream> {
        let key = self.metadata.resolve_key(owner, file_name).await?;
        self.ensure_bucket().await?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if let SdkError::ServiceError(service_err) = &e {
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) {
                        return StorageError::NotFound(file_name.to_string());
                    }
                }
                self.sdk_error("download", e)
            })?;

        tracing::debug!(bucket = %self.bucket, owner_id = %owner, key = %key, "S3 read");

        let bucket = self.bucket.clone();
        let stream = ReaderStream::new(response.body.into_async_read()).map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(bucket = %bucket, key = %key, error = %e, "S3 stream download error");
                StorageError::fault(format!("Failed to read object {}", key), e)
            })
        });
        Ok(Box::pin(stream))
    }

    async fn delete(&self, owner: Uuid, file_name: &str) -> StorageResult<()> {
        let key = self.metadata.resolve_key(owner, file_name).await?;
        self.ensure_bucket().await?;
        let start = std::time::Instant::now();

        if !self.object_exists(&key).await? {
            return Err(StorageError::NotFound(file_name.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.sdk_error("delete", e))?;

        self.metadata.forget(owner, &[file_name, &key]).await;

        tracing::info!(
            bucket = %self.bucket,
            owner_id = %owner,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn list(&self, owner: Uuid, query: &ListQuery) -> StorageResult<ListPage> {
        let mut collector = PageCollector::new(query);
        self.scan_prefix(&Self::owner_prefix(owner), |object| {
            if let Some(candidate) = candidate_from_object(owner, object) {
                collector.offer(candidate);
            }
        })
        .await?;
        let (page, total) = collector.finish();

        let entries = page
            .into_iter()
            .map(|candidate| FileEntry {
                content_type: content_type::from_extension(&candidate.original_name),
                id: candidate.token,
                filename: candidate.filename,
                original_name: candidate.original_name,
                size: candidate.size,
                upload_date: candidate.created,
                is_public: false,
                owner_id: owner,
            })
            .collect();

        Ok(ListPage { entries, total })
    }

    async fn count(&self, owner: Uuid, search: Option<&str>) -> StorageResult<u64> {
        let filter = SearchFilter::new(search);
        let mut total = 0u64;
        self.scan_prefix(&Self::owner_prefix(owner), |object| {
            if candidate_from_object(owner, object).is_some_and(|c| filter.matches(&c)) {
                total += 1;
            }
        })
        .await?;
        Ok(total)
    }

    async fn all_keys(&self) -> StorageResult<Vec<String>> {
        let mut found = Vec::new();
        self.scan_prefix("", |object| {
            if let Some(key) = object.key() {
                if keys::owner_prefix(key).is_some() && !key.ends_with('/') {
                    found.push(key.to_string());
                }
            }
        })
        .await?;
        found.sort();
        Ok(found)
    }

    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
    use aws_sdk_s3::operation::get_object::GetObjectOutput;
    use aws_sdk_s3::operation::head_bucket::HeadBucketOutput;
    use aws_sdk_s3::operation::head_object::HeadObjectOutput;
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
    use aws_sdk_s3::operation::put_object::PutObjectOutput;
    use aws_sdk_s3::primitives::DateTime as AwsDateTime;
    use aws_sdk_s3::types::error::NotFound;
    use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};
    use filehub_core::models::{SortDirection, SortField, SortSpec};
    use filehub_db::InMemoryFileMetadataStore;
    use futures::TryStreamExt;
    use std::sync::Arc;

    fn bucket_exists() -> Rule {
        mock!(aws_sdk_s3::Client::head_bucket).then_output(|| HeadBucketOutput::builder().build())
    }

    fn storage_with(rules: &[&Rule]) -> (S3Storage, Arc<InMemoryFileMetadataStore>) {
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, rules);
        let store = Arc::new(InMemoryFileMetadataStore::new());
        let storage =
            S3Storage::with_client(client, "files", "us-east-1", MetadataIndex::new(store.clone()));
        (storage, store)
    }

    fn object(key: &str, size: i64, secs: i64) -> Object {
        Object::builder()
            .key(key)
            .size(size)
            .last_modified(AwsDateTime::from_secs(secs))
            .build()
    }

    #[test]
    fn test_candidate_from_object_strips_owner_prefix() {
        let owner = Uuid::new_v4();
        let key = format!("{}/abc_report.pdf", owner);

        let candidate = candidate_from_object(owner, &object(&key, 1024, 1_714_557_600)).unwrap();

        assert_eq!(candidate.filename, key);
        assert_eq!(candidate.token, "abc");
        assert_eq!(candidate.original_name, "report.pdf");
        assert_eq!(candidate.size, 1024);
        assert_eq!(candidate.created.timestamp(), 1_714_557_600);
    }

    #[test]
    fn test_candidate_without_token_keeps_whole_name() {
        let owner = Uuid::new_v4();
        let key = format!("{}/legacy.pdf", owner);
        let candidate = candidate_from_object(owner, &object(&key, 1, 0)).unwrap();
        assert_eq!(candidate.token, "");
        assert_eq!(candidate.original_name, "legacy.pdf");
    }

    #[test]
    fn test_candidate_skips_foreign_and_folder_keys() {
        let owner = Uuid::new_v4();
        let foreign = format!("{}/abc_report.pdf", Uuid::new_v4());
        assert!(candidate_from_object(owner, &object(&foreign, 1, 0)).is_none());
        let folder = format!("{}/nested/", owner);
        assert!(candidate_from_object(owner, &object(&folder, 0, 0)).is_none());
    }

    #[test]
    fn test_candidate_search_ignores_owner_prefix() {
        let owner = Uuid::new_v4();
        let key = format!("{}/abc_report.pdf", owner);
        let candidate = candidate_from_object(owner, &object(&key, 1, 0)).unwrap();

        for needle in ["/", owner.to_string().as_str()] {
            assert!(!SearchFilter::new(Some(needle)).matches(&candidate), "{}", needle);
        }
        assert!(SearchFilter::new(Some("REPORT")).matches(&candidate));
        assert!(SearchFilter::new(Some("abc_")).matches(&candidate));
    }

    #[tokio::test]
    async fn test_store_records_full_key() {
        let owner = Uuid::new_v4();
        let prefix = format!("{}/", owner);
        let put = mock!(aws_sdk_s3::Client::put_object)
            .match_requests(move |req| req.key().is_some_and(|k| k.starts_with(&prefix)))
            .then_output(|| PutObjectOutput::builder().build());
        let head = bucket_exists();
        let (storage, store) = storage_with(&[&head, &put]);

        let stored = storage
            .store(owner, Bytes::from_static(b"%PDF-1.4"), "report.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(put.num_calls(), 1);
        assert_eq!(stored.file_name, stored.key);
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stored_filename, stored.key);
        assert_eq!(records[0].bucket_name, "files");
    }

    #[tokio::test]
    async fn test_metadata_failure_removes_uploaded_object() {
        let owner = Uuid::new_v4();
        let head = bucket_exists();
        let put = mock!(aws_sdk_s3::Client::put_object)
            .then_output(|| PutObjectOutput::builder().build());
        let remove = mock!(aws_sdk_s3::Client::delete_object)
            .then_output(|| DeleteObjectOutput::builder().build());
        let (storage, store) = storage_with(&[&head, &put, &remove]);
        store.fail_next_insert();

        let err = storage
            .store(owner, Bytes::from_static(b"%PDF-1.4"), "a.pdf", "application/pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Metadata(_)));
        assert_eq!(put.num_calls(), 1);
        assert_eq!(remove.num_calls(), 1);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_by_bare_name_streams_full_key() {
        let owner = Uuid::new_v4();
        let bare = format!("{}_notes.txt", Uuid::new_v4());
        let key = format!("{}/{}", owner, bare);
        let expected = key.clone();
        let get = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(move |req| req.key() == Some(expected.as_str()))
            .then_output(|| {
                GetObjectOutput::builder()
                    .body(ByteStream::from_static(b"hello"))
                    .build()
            });
        let head = bucket_exists();
        let (storage, _store) = storage_with(&[&head, &get]);
        storage
            .metadata
            .record_upload(owner, &key, "notes.txt", "text/plain", 5, "files")
            .await
            .unwrap();

        let chunks: Vec<Bytes> = storage
            .read(owner, &bare)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat(), b"hello");
        assert_eq!(get.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_bare_name_forgets_both_spellings() {
        let owner = Uuid::new_v4();
        let bare = format!("{}_report.pdf", Uuid::new_v4());
        let key = format!("{}/{}", owner, bare);
        let head_key = key.clone();
        let delete_key = key.clone();
        let head = bucket_exists();
        let exists = mock!(aws_sdk_s3::Client::head_object)
            .match_requests(move |req| req.key() == Some(head_key.as_str()))
            .then_output(|| HeadObjectOutput::builder().content_length(8).build());
        let remove = mock!(aws_sdk_s3::Client::delete_object)
            .match_requests(move |req| req.key() == Some(delete_key.as_str()))
            .then_output(|| DeleteObjectOutput::builder().build());
        let (storage, store) = storage_with(&[&head, &exists, &remove]);
        for name in [bare.as_str(), key.as_str()] {
            storage
                .metadata
                .record_upload(owner, name, "report.pdf", "application/pdf", 8, "files")
                .await
                .unwrap();
        }

        storage.delete(owner, &bare).await.unwrap();

        assert_eq!(exists.num_calls(), 1);
        assert_eq!(remove.num_calls(), 1);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_not_found() {
        let owner = Uuid::new_v4();
        let key = format!("{}/abc_gone.pdf", owner);
        let head = bucket_exists();
        let missing = mock!(aws_sdk_s3::Client::head_object)
            .then_error(|| HeadObjectError::NotFound(NotFound::builder().build()));
        let remove = mock!(aws_sdk_s3::Client::delete_object)
            .then_output(|| DeleteObjectOutput::builder().build());
        let (storage, _store) = storage_with(&[&head, &missing, &remove]);

        let err = storage.delete(owner, &key).await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(remove.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_list_follows_continuation_token() {
        let owner = Uuid::new_v4();
        let first_page = vec![
            object(&format!("{}/a_big.pdf", owner), 300, 10),
            object(&format!("{}/nested/", owner), 0, 10),
            object(&format!("{}/b_small.pdf", owner), 100, 20),
        ];
        let second_page = vec![object(&format!("{}/c_medium.pdf", owner), 200, 30)];
        let head = bucket_exists();
        let page_one = mock!(aws_sdk_s3::Client::list_objects_v2)
            .match_requests(|req| req.continuation_token().is_none())
            .then_output(move || {
                ListObjectsV2Output::builder()
                    .set_contents(Some(first_page.clone()))
                    .is_truncated(true)
                    .next_continuation_token("page-2")
                    .build()
            });
        let page_two = mock!(aws_sdk_s3::Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("page-2"))
            .then_output(move || {
                ListObjectsV2Output::builder()
                    .set_contents(Some(second_page.clone()))
                    .is_truncated(false)
                    .build()
            });
        let (storage, _store) = storage_with(&[&head, &page_one, &page_two]);

        let query = ListQuery {
            page: 0,
            page_size: Some(2),
            sort: SortSpec {
                field: SortField::Size,
                direction: SortDirection::Asc,
            },
            search: None,
        };
        let page = storage.list(owner, &query).await.unwrap();

        assert_eq!(page_one.num_calls(), 1);
        assert_eq!(page_two.num_calls(), 1);
        assert_eq!(page.total, 3);
        let names: Vec<&str> = page.entries.iter().map(|e| e.original_name.as_str()).collect();
        assert_eq!(names, vec!["small.pdf", "medium.pdf"]);
    }
}
