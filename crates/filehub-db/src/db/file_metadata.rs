//! File metadata repository: CRUD for the file_metadata table.

use chrono::{DateTime, Utc};
use filehub_core::models::{FileCategory, FileRecord, NewFileRecord};
use filehub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Metadata index operations used by the storage backends and the records API.
#[async_trait::async_trait]
pub trait FileMetadataStore: Send + Sync {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, AppError>;

    async fn find_by_stored_filename(
        &self,
        stored_filename: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Rows of `user_id` whose stored filename contains `fragment` literally.
    async fn find_by_user_and_stored_filename_containing(
        &self,
        user_id: Uuid,
        fragment: &str,
    ) -> Result<Vec<FileRecord>, AppError>;

    /// Newest first, optionally restricted to one category.
    async fn find_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn count_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
    ) -> Result<i64, AppError>;

    /// Returns the number of rows removed.
    async fn delete_by_stored_filename(&self, stored_filename: &str) -> Result<u64, AppError>;

    async fn stored_filenames_in_bucket(&self, bucket_name: &str)
        -> Result<Vec<String>, AppError>;
}

/// Row type for file_metadata table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileMetadataRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub content_type: String,
    pub file_type: FileCategory,
    pub size: i64,
    pub bucket_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileMetadataRow {
    pub fn into_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            user_id: self.user_id,
            original_filename: self.original_filename,
            stored_filename: self.stored_filename,
            content_type: self.content_type,
            file_type: self.file_type,
            size: self.size,
            bucket_name: self.bucket_name,
            uploaded_at: self.uploaded_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, original_filename, stored_filename, content_type, \
     file_type, size, bucket_name, uploaded_at";

/// Repository for file_metadata table.
#[derive(Clone)]
pub struct PgFileMetadataRepository {
    pool: PgPool,
}

impl PgFileMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileMetadataStore for PgFileMetadataRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "file_metadata", stored_filename = %record.stored_filename))]
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, AppError> {
        let row: FileMetadataRow = sqlx::query_as::<Postgres, FileMetadataRow>(&format!(
            r#"
            INSERT INTO file_metadata
                (id, user_id, original_filename, stored_filename, content_type, file_type, size, bucket_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(&record.original_filename)
        .bind(&record.stored_filename)
        .bind(&record.content_type)
        .bind(record.file_type)
        .bind(record.size)
        .bind(&record.bucket_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_record())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata"))]
    async fn find_by_stored_filename(
        &self,
        stored_filename: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileMetadataRow> = sqlx::query_as::<Postgres, FileMetadataRow>(&format!(
            "SELECT {} FROM file_metadata WHERE stored_filename = $1 LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(stored_filename)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileMetadataRow::into_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata", db.user_id = %user_id))]
    async fn find_by_user_and_stored_filename_containing(
        &self,
        user_id: Uuid,
        fragment: &str,
    ) -> Result<Vec<FileRecord>, AppError> {
        // strpos keeps '%' and '_' in file names literal
        let rows: Vec<FileMetadataRow> = sqlx::query_as::<Postgres, FileMetadataRow>(&format!(
            r#"
            SELECT {} FROM file_metadata
            WHERE user_id = $1 AND strpos(stored_filename, $2) > 0
            ORDER BY uploaded_at DESC
            "#,
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(fragment)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FileMetadataRow::into_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata", db.user_id = %user_id))]
    async fn find_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let rows: Vec<FileMetadataRow> = sqlx::query_as::<Postgres, FileMetadataRow>(&format!(
            r#"
            SELECT {} FROM file_metadata
            WHERE user_id = $1 AND ($2::file_category IS NULL OR file_type = $2)
            ORDER BY uploaded_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FileMetadataRow::into_record).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata", db.user_id = %user_id))]
    async fn count_by_user(
        &self,
        user_id: Uuid,
        category: Option<FileCategory>,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT COUNT(*) FROM file_metadata
            WHERE user_id = $1 AND ($2::file_category IS NULL OR file_type = $2)
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata"))]
    async fn delete_by_stored_filename(&self, stored_filename: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM file_metadata WHERE stored_filename = $1")
            .bind(stored_filename)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_metadata", bucket = %bucket_name))]
    async fn stored_filenames_in_bucket(
        &self,
        bucket_name: &str,
    ) -> Result<Vec<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar::<Postgres, String>(
            "SELECT stored_filename FROM file_metadata WHERE bucket_name = $1",
        )
        .bind(bucket_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}
