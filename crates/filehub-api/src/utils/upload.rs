//! Common utilities for the upload handler

use axum::extract::Multipart;
use bytes::Bytes;
use filehub_core::AppError;

const MAX_FILENAME_LENGTH: usize = 255;

/// A file part pulled out of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub data: Bytes,
    pub filename: String,
    pub content_type: String,
}

/// Extract file data, filename, and content type from multipart form.
/// Only one field named "file" is accepted; multiple file fields are rejected.
pub async fn extract_multipart_file(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if file.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;

        file = Some(UploadedFile {
            data,
            filename: filename.unwrap_or_else(|| "unknown".to_string()),
            content_type: content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        });
    }

    file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
}

/// Validate file size
pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size == 0 {
        return Err(AppError::InvalidInput("Please select a file to upload".to_string()));
    }
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Normalize MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Validate content type against allowlist. Compares normalized MIME type only.
pub fn validate_content_type(content_type: &str, allowed_types: &[String]) -> Result<(), AppError> {
    let normalized = normalize_mime_type(content_type);
    if !allowed_types
        .iter()
        .any(|allowed| normalized == allowed.to_lowercase())
    {
        return Err(AppError::InvalidInput(format!(
            "Only PDF, PNG, and JPG files are allowed. Allowed types: {}",
            allowed_types.join(", ")
        )));
    }
    Ok(())
}

/// Strip any client-side directories and replace characters that do not
/// belong in a stored name. Path traversal is rejected outright.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if filename_only.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}
