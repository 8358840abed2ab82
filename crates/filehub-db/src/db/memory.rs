//! In-process stores for tests that should not need Postgres.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use filehub_core::models::{FileCategory, FileRecord, NewFileRecord, NewUser, User};
use filehub_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::file_metadata::FileMetadataStore;
use super::user::UserStore;

#[derive(Default)]
pub struct InMemoryFileMetadataStore {
    records: RwLock<Vec<FileRecord>>,
    fail_next_insert: AtomicBool,
}

impl InMemoryFileMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `insert` return a database error.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<FileRecord> {
        self.records.read().await.clone()
    }

    /// Insert a row as-is, bypassing any uniqueness check.
    pub async fn push(&self, record: FileRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait::async_trait]
impl FileMetadataStore for InMemoryFileMetadataStore {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut records = self.records.write().await;
        if records.iter().any(|r| {
            r.bucket_name == record.bucket_name && r.stored_filename == record.stored_filename
        }) {
            return Err(AppError::Conflict(format!(
                "Metadata for '{}' already exists",
                record.stored_filename
            )));
        }
        let stored = FileRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            original_filename: record.original_filename,
            stored_filename: record.stored_filename,
            content_type: record.content_type,
            file_type: record.file_type,
            size: record.size,
            bucket_name: record.bucket_name,
            uploaded_at: Utc::now(),
        };
        records.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_stored_filename(
        &self,
        stored_filename: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.stored_filename == stored_filename)
            .cloned())
    }

    async fn find_by_user_and_stored_filename_containing(
        &self,
        user_id: Uuid,
        fragment: &str,
    ) -> Result<Vec<FileRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && r.stored_filename.contains(fragment))
            .cloned()
            .collect())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut rows: Vec<FileRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && category.map_or(true, |c| r.file_type == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
    ) -> Result<i64, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && category.map_or(true, |c| r.file_type == c))
            .count() as i64)
    }

    async fn delete_by_stored_filename(&self, stored_filename: &str) -> Result<u64, AppError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.stored_filename != stored_filename);
        Ok((before - records.len()) as u64)
    }

    async fn stored_filenames_in_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Vec<String>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.bucket_name == bucket_name)
            .map(|r| r.stored_filename.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            let now = Utc::now();
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }
}
