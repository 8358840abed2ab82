use crate::content_type;
use crate::keys;
use crate::listing::{Candidate, PageCollector, SearchFilter};
use crate::reconcile::MetadataIndex;
use crate::traits::{FileStorage, FileStream, StorageError, StorageResult, StoredFile};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filehub_core::constants::FILESYSTEM_BUCKET;
use filehub_core::models::{FileEntry, ListPage, ListQuery};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Local filesystem storage implementation
///
/// Files of one owner live in `{root}/{owner_id}/{token}_{original}`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    metadata: MetadataIndex,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `root`, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>, metadata: MetadataIndex) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::BackendUnavailable(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage { root, metadata })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: Uuid) -> PathBuf {
        self.root.join(owner.to_string())
    }

    /// Path of a client-supplied file name, plus its bare name.
    fn file_path(&self, owner: Uuid, file_name: &str) -> StorageResult<(PathBuf, String)> {
        let bare = keys::bare_name_for_owner(owner, file_name)?;
        Ok((self.owner_dir(owner).join(&bare), bare))
    }

    /// Create the owner directory, returning it.
    async fn ensure_owner_dir(&self, owner: Uuid) -> StorageResult<PathBuf> {
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::fault(format!("Failed to create directory {}", dir.display()), e)
        })?;
        Ok(dir)
    }

    /// Write via a sibling temp file and rename over the target.
    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::fault(
                format!("Failed to write file {}", path.display()),
                e,
            ));
        }
        Ok(())
    }

    /// Stream candidates of one owner directory into `sink`.
    ///
    /// A missing directory is created and yields nothing.
    async fn scan_owner<F>(&self, owner: Uuid, mut sink: F) -> StorageResult<()>
    where
        F: FnMut(Candidate),
    {
        let dir = self.owner_dir(owner);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.ensure_owner_dir(owner).await?;
                return Ok(());
            }
            Err(e) => {
                return Err(StorageError::fault(
                    format!("Failed to list directory {}", dir.display()),
                    e,
                ))
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::fault(format!("Failed to list directory {}", dir.display()), e)
        })? {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            // temp files of in-flight writes
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                // removed while listing
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::fault(
                        format!("Failed to stat {}", entry.path().display()),
                        e,
                    ))
                }
            };
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            sink(Candidate::new(name.clone(), &name, meta.len(), created));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
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

        let key = keys::derive_key(owner, original_filename);
        let file_name = keys::basename(&key).to_string();
        let dir = self.ensure_owner_dir(owner).await?;
        let path = dir.join(&file_name);
        let size = data.len() as u64;

        let start = std::time::Instant::now();
        Self::write_atomic(&path, &data).await?;

        if let Err(e) = self
            .metadata
            .record_upload(
                owner,
                &key,
                original_filename,
                content_type,
                size,
                FILESYSTEM_BUCKET,
            )
            .await
        {
            tracing::error!(
                error = %e,
                key = %key,
                "Metadata insert failed, removing stored file"
            );
            if let Err(remove_err) = fs::remove_file(&path).await {
                tracing::error!(
                    error = %remove_err,
                    path = %path.display(),
                    "Failed to remove file after metadata failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            path = %path.display(),
            owner_id = %owner,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredFile {
            key,
            file_name,
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn read(&self, owner: Uuid, file_name: &str) -> StorageResult<FileStream> {
        let (path, bare) = self.file_path(owner, file_name)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(bare));
            }
            Err(e) => {
                return Err(StorageError::fault(
                    format!("Failed to open file {}", path.display()),
                    e,
                ))
            }
        };
        if !file.metadata().await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(StorageError::NotFound(bare));
        }

        tracing::debug!(owner_id = %owner, key = %bare, "Local storage read");

        let display = path.display().to_string();
        let stream = ReaderStream::new(file).map(move |chunk| {
            chunk.map_err(|e| StorageError::fault(format!("Failed to read file {}", display), e))
        });
        Ok(Box::pin(stream))
    }

    async fn delete(&self, owner: Uuid, file_name: &str) -> StorageResult<()> {
        let (path, bare) = self.file_path(owner, file_name)?;
        let start = std::time::Instant::now();

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(bare)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(bare));
            }
            Err(e) => {
                return Err(StorageError::fault(
                    format!("Failed to stat file {}", path.display()),
                    e,
                ))
            }
        }

        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(bare.clone()),
            _ => StorageError::fault(format!("Failed to delete file {}", path.display()), e),
        })?;

        let key = keys::full_key(owner, &bare);
        self.metadata.forget(owner, &[&key]).await;

        tracing::info!(
            path = %path.display(),
            owner_id = %owner,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn list(&self, owner: Uuid, query: &ListQuery) -> StorageResult<ListPage> {
        let mut collector = PageCollector::new(query);
        self.scan_owner(owner, |candidate| collector.offer(candidate))
            .await?;
        let (page, total) = collector.finish();

        let dir = self.owner_dir(owner);
        let mut entries = Vec::with_capacity(page.len());
        for candidate in page {
            let content_type =
                content_type::sniff_file(&dir.join(&candidate.filename), &candidate.original_name)
                    .await;
            entries.push(FileEntry {
                id: candidate.token,
                filename: candidate.filename,
                original_name: candidate.original_name,
                size: candidate.size,
                content_type,
                upload_date: candidate.created,
                is_public: false,
                owner_id: owner,
            });
        }

        Ok(ListPage { entries, total })
    }

    async fn count(&self, owner: Uuid, search: Option<&str>) -> StorageResult<u64> {
        let filter = SearchFilter::new(search);
        let mut total = 0u64;
        self.scan_owner(owner, |candidate| {
            if filter.matches(&candidate) {
                total += 1;
            }
        })
        .await?;
        Ok(total)
    }

    async fn all_keys(&self) -> StorageResult<Vec<String>> {
        let mut found = Vec::new();
        let mut owners = fs::read_dir(&self.root).await.map_err(|e| {
            StorageError::fault(format!("Failed to list {}", self.root.display()), e)
        })?;

        while let Some(owner_entry) = owners
            .next_entry()
            .await
            .map_err(|e| StorageError::fault(format!("Failed to list {}", self.root.display()), e))?
        {
            let is_dir = owner_entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let Some(owner) = owner_entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                continue;
            };
            if !is_dir {
                continue;
            }
            self.scan_owner(owner, |candidate| {
                found.push(keys::full_key(owner, &candidate.filename));
            })
            .await?;
        }

        found.sort();
        Ok(found)
    }

    fn bucket_name(&self) -> &str {
        FILESYSTEM_BUCKET
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
