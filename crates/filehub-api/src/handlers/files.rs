//! File listing, upload, download and delete

use crate::auth::models::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::upload::{
    extract_multipart_file, normalize_mime_type, sanitize_filename, validate_content_type,
    validate_file_size,
};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Response, StatusCode},
    Json,
};
use filehub_core::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use filehub_core::models::{FileEntry, ListQuery, SortSpec};
use filehub_core::AppError;
use filehub_storage::keys::{basename, split_stored_name};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// RFC 5987 attr-char minus the characters that are unsafe inside a quoted string
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListFilesQuery {
    /// Zero-based page number
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// `field,direction` with field one of filename, size, creationTime
    pub sort: Option<String>,
    /// Case-insensitive substring of the original or stored name
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    pub files: Vec<FileEntry>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Name to pass back to download and delete
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub file_name: String,
    pub status: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileNameRequest {
    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,
}

#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "One page of the caller's files", body = FileListResponse),
        (status = 400, description = "Invalid paging or sort", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, query), fields(user_id = %user.user_id, operation = "list_files"))]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 {
        return Err(AppError::InvalidInput("size must be at least 1".to_string()).into());
    }
    let size = size.min(MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(0);

    let list_query = ListQuery {
        page,
        page_size: Some(size),
        sort: SortSpec::parse(query.sort.as_deref().unwrap_or(""))?,
        search: query.search,
    };

    let started = Instant::now();
    let result = state.storage.list(user.user_id, &list_query).await?;
    tracing::debug!(
        total = result.total,
        returned = result.entries.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Listed files"
    );

    Ok(Json(FileListResponse {
        files: result.entries,
        total_count: result.total,
        current_page: page,
        total_pages: result.total.div_ceil(u64::from(size)),
    }))
}

#[utoipa::path(
    post,
    path = "/files/upload",
    tag = "files",
    request_body(content_type = "multipart/form-data", description = "Form field `file`"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Empty file or type not allowed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %user.user_id, operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let file = extract_multipart_file(multipart).await?;

    validate_file_size(file.data.len(), state.config.max_file_size_bytes())?;
    validate_content_type(&file.content_type, state.config.allowed_content_types())?;
    let filename = sanitize_filename(&file.filename)?;
    let content_type = normalize_mime_type(&file.content_type);

    let started = Instant::now();
    let stored = state
        .storage
        .store(user.user_id, file.data, &filename, &content_type)
        .await?;

    tracing::info!(
        key = %stored.key,
        size_bytes = stored.size,
        duration_ms = started.elapsed().as_millis() as u64,
        "File uploaded"
    );

    Ok(Json(UploadResponse {
        file_name: stored.file_name,
        file_size: stored.size,
        content_type: stored.content_type,
        status: "success".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/files/download/{file_name}",
    tag = "files",
    params(
        ("file_name" = String, Path, description = "Name returned by upload or listing")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 409, description = "Name matches several files", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(file_name): Path<String>,
) -> Result<Response<Body>, HttpAppError> {
    stream_file(&state, &user, &file_name).await
}

#[utoipa::path(
    post,
    path = "/files/download",
    tag = "files",
    request_body = FileNameRequest,
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Missing fileName", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file_by_body(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    ValidatedJson(request): ValidatedJson<FileNameRequest>,
) -> Result<Response<Body>, HttpAppError> {
    stream_file(&state, &user, &request.file_name).await
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id, operation = "download_file"))]
async fn stream_file(
    state: &AppState,
    user: &UserContext,
    file_name: &str,
) -> Result<Response<Body>, HttpAppError> {
    let stream = state.storage.read(user.user_id, file_name).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, content_disposition(file_name))
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// `attachment` disposition naming the original file, safe for any client.
fn content_disposition(file_name: &str) -> String {
    let (_, original) = split_stored_name(basename(file_name));
    let encoded = utf8_percent_encode(original, ATTR_CHAR).to_string();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        encoded, encoded
    )
}

#[utoipa::path(
    delete,
    path = "/files/delete/{file_name}",
    tag = "files",
    params(
        ("file_name" = String, Path, description = "Name returned by upload or listing")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 409, description = "Name matches several files", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(file_name): Path<String>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    remove_file(&state, &user, file_name).await
}

#[utoipa::path(
    put,
    path = "/files/delete",
    tag = "files",
    request_body = FileNameRequest,
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 400, description = "Missing fileName", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file_by_body(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    ValidatedJson(request): ValidatedJson<FileNameRequest>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    remove_file(&state, &user, request.file_name).await
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id, operation = "delete_file"))]
async fn remove_file(
    state: &AppState,
    user: &UserContext,
    file_name: String,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    state.storage.delete(user.user_id, &file_name).await?;

    tracing::info!(file_name = %file_name, "File deleted");

    Ok(Json(DeleteResponse {
        file_name,
        status: "deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_uses_original_name() {
        let header = content_disposition(
            "7d3c1a2e-0000-4000-8000-000000000000/0b0e7f9e-1111-4111-8111-111111111111_report.pdf",
        );
        assert_eq!(
            header,
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_encodes_unsafe_characters() {
        let header = content_disposition("abc_r\u{e9}sum\u{e9} \"v2\".pdf");
        assert_eq!(
            header,
            "attachment; filename=\"r%C3%A9sum%C3%A9%20%22v2%22.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22.pdf"
        );
    }

    #[test]
    fn test_content_disposition_without_token() {
        assert_eq!(
            content_disposition("notes.pdf"),
            "attachment; filename=\"notes.pdf\"; filename*=UTF-8''notes.pdf"
        );
    }
}
