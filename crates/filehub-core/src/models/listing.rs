//! Listing request and response types shared by both storage backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Filename,
    Size,
    #[default]
    CreationTime,
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "filename" | "fileName" | "originalName" | "name" => Ok(SortField::Filename),
            "size" => Ok(SortField::Size),
            "creationTime" | "uploadDate" | "uploadedAt" | "createdAt" => {
                Ok(SortField::CreationTime)
            }
            other => Err(AppError::InvalidInput(format!(
                "Unknown sort field '{}', expected filename, size or creationTime",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(AppError::InvalidInput(format!(
                "Unknown sort direction '{}', expected asc or desc",
                other
            ))),
        }
    }
}

/// Sort order of a listing. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parse the `field,direction` form used by the `sort` query parameter.
    ///
    /// An empty value yields the default order. A field without a direction
    /// sorts ascending.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(SortSpec::default());
        }
        let (field, direction) = match raw.split_once(',') {
            Some((field, direction)) => (field.parse()?, direction.parse()?),
            None => (raw.parse()?, SortDirection::Asc),
        };
        Ok(SortSpec { field, direction })
    }
}

/// Page, order and filter for a listing call.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: u32,
    /// `None` means every matching entry in a single page.
    pub page_size: Option<u32>,
    pub sort: SortSpec,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn offset(&self) -> usize {
        match self.page_size {
            Some(size) => self.page as usize * size as usize,
            None => 0,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.page_size.map(|size| size as usize)
    }

    /// The search term when it is non-blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

/// One row of a file listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Random token segment of the stored name
    pub id: String,
    /// Name to pass back to download and delete
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
    pub is_public: bool,
    pub owner_id: Uuid,
}

/// A page of entries plus the number of entries matching the filter.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<FileEntry>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_spec_default_is_newest_first() {
        let spec = SortSpec::parse("").unwrap();
        assert_eq!(spec.field, SortField::CreationTime);
        assert_eq!(spec.direction, SortDirection::Desc);
    }

    #[test]
    fn test_sort_spec_parse_field_and_direction() {
        let spec = SortSpec::parse("size,DESC").unwrap();
        assert_eq!(spec.field, SortField::Size);
        assert_eq!(spec.direction, SortDirection::Desc);

        let spec = SortSpec::parse("uploadDate").unwrap();
        assert_eq!(spec.field, SortField::CreationTime);
        assert_eq!(spec.direction, SortDirection::Asc);
    }

    #[test]
    fn test_sort_spec_rejects_unknown_field() {
        assert!(SortSpec::parse("owner,asc").is_err());
        assert!(SortSpec::parse("size,sideways").is_err());
    }

    #[test]
    fn test_query_offset_and_search() {
        let query = ListQuery {
            page: 2,
            page_size: Some(10),
            search: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);
        assert_eq!(query.limit(), Some(10));
        assert_eq!(query.search_term(), None);

        let unbounded = ListQuery {
            page: 3,
            search: Some(" Report ".to_string()),
            ..Default::default()
        };
        assert_eq!(unbounded.offset(), 0);
        assert_eq!(unbounded.limit(), None);
        assert_eq!(unbounded.search_term(), Some("Report"));
    }

    #[test]
    fn test_entry_serializes_iso_upload_date() {
        let entry = FileEntry {
            id: "abc".to_string(),
            filename: "abc_report.pdf".to_string(),
            original_name: "report.pdf".to_string(),
            size: 1024,
            content_type: "application/pdf".to_string(),
            upload_date: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            is_public: false,
            owner_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["originalName"], "report.pdf");
        assert_eq!(json["isPublic"], false);
        assert_eq!(json["uploadDate"], "2024-05-01T10:00:00Z");
    }
}
