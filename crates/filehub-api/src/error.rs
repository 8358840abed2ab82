//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors
//! (`AppError`, `StorageError`) convert into `HttpAppError` with `?` and render
//! as a JSON `ErrorResponse` with the status from `ErrorMetadata`.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filehub_core::{AppError, ErrorMetadata, LogLevel};
use filehub_storage::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rule: IntoResponse and AppError both live in other crates)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            StorageError::EmptyInput => {
                AppError::InvalidInput("Uploaded file is empty".to_string())
            }
            StorageError::AmbiguousReference { name, matches } => AppError::Conflict(format!(
                "File name '{}' matches {} stored files",
                name, matches
            )),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::BackendUnavailable(msg) => AppError::StorageUnavailable(msg),
            StorageError::Metadata(app) => app,
            StorageError::Fault { context, source } => {
                AppError::Storage(format!("{}: {}", context, source))
            }
        };
        HttpAppError(app)
    }
}

/// JSON body extractor that deserializes and runs `validator` rules,
/// answering 400 with an `ErrorResponse` on failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only outside production and only for non-sensitive errors
        let show_details = !is_production_env() && !app_error.is_sensitive();
        let body = ErrorResponse {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: StorageError) -> StatusCode {
        HttpAppError::from(err).into_response().status()
    }

    #[test]
    fn test_storage_error_status_mapping() {
        assert_eq!(
            status_of(StorageError::NotFound("a".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(StorageError::EmptyInput), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(StorageError::AmbiguousReference {
                name: "a".into(),
                matches: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StorageError::InvalidKey("..".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StorageError::BackendUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(StorageError::fault("disk", "boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
