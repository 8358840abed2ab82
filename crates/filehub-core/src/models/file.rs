use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppError;

/// Closed set of file categories tracked in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_category", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileCategory {
    Pdf,
    Png,
    Jpg,
}

impl FileCategory {
    /// Category for a MIME type, or `None` when the type is not one we track.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_lowercase();
        match normalized.as_str() {
            "application/pdf" => Some(FileCategory::Pdf),
            "image/png" => Some(FileCategory::Png),
            "image/jpeg" | "image/jpg" => Some(FileCategory::Jpg),
            _ => None,
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileCategory::Pdf => write!(f, "PDF"),
            FileCategory::Png => write!(f, "PNG"),
            FileCategory::Jpg => write!(f, "JPG"),
        }
    }
}

impl FromStr for FileCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PDF" => Ok(FileCategory::Pdf),
            "PNG" => Ok(FileCategory::Png),
            "JPG" | "JPEG" => Ok(FileCategory::Jpg),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid file type '{}', expected PDF, PNG or JPG",
                s
            ))),
        }
    }
}

/// Persisted metadata for one stored file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    /// Full owner-prefixed key: `<ownerId>/<token>_<original>`
    pub stored_filename: String,
    pub content_type: String,
    pub file_type: FileCategory,
    pub size: i64,
    pub bucket_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Fields needed to insert a [`FileRecord`]. Id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub user_id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub content_type: String,
    pub file_type: FileCategory,
    pub size: i64,
    pub bucket_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadataDto {
    pub id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub size: i64,
    pub file_type: FileCategory,
    pub uploaded_at: DateTime<Utc>,
    pub user_id: Uuid,
}

impl From<FileRecord> for FileMetadataDto {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename,
            content_type: record.content_type,
            size: record.size,
            file_type: record.file_type,
            uploaded_at: record.uploaded_at,
            user_id: record.user_id,
        }
    }
}
