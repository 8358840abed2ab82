//! Metadata rows of the caller's files

use crate::auth::models::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use filehub_core::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use filehub_core::models::{FileCategory, FileMetadataDto};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    /// Zero-based page number
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// PDF, PNG or JPG
    pub file_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordListResponse {
    pub records: Vec<FileMetadataDto>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u64,
}

#[utoipa::path(
    get,
    path = "/files/records",
    tag = "files",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Metadata rows, newest first", body = RecordListResponse),
        (status = 400, description = "Invalid file type", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, query), fields(user_id = %user.user_id))]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordListResponse>, HttpAppError> {
    let category = query
        .file_type
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<FileCategory>)
        .transpose()?;

    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(0);
    let offset = i64::from(page) * i64::from(size);

    let records = state
        .metadata
        .find_by_user(user.user_id, category, i64::from(size), offset)
        .await?;
    let total = u64::try_from(state.metadata.count_by_user(user.user_id, category).await?)
        .unwrap_or(0);

    Ok(Json(RecordListResponse {
        records: records.into_iter().map(FileMetadataDto::from).collect(),
        total_count: total,
        current_page: page,
        total_pages: total.div_ceil(u64::from(size)),
    }))
}
