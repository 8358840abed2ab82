//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::models;
use crate::error;
use crate::handlers;
use filehub_core::models as core_models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Filehub API",
        version = "0.1.0",
        description = "Per-user file storage backed by the local filesystem or an S3-compatible bucket."
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::files::list_files,
        handlers::files::upload_file,
        handlers::files::download_file,
        handlers::files::download_file_by_body,
        handlers::files::delete_file,
        handlers::files::delete_file_by_body,
        handlers::records::list_records,
    ),
    components(
        schemas(
            models::RegisterRequest,
            models::LoginRequest,
            models::AuthResponse,
            models::UserResponse,
            handlers::health::HealthResponse,
            handlers::files::FileListResponse,
            handlers::files::UploadResponse,
            handlers::files::DeleteResponse,
            handlers::files::FileNameRequest,
            handlers::records::RecordListResponse,
            core_models::FileEntry,
            core_models::FileMetadataDto,
            core_models::FileCategory,
            error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and active storage backend"),
        (name = "auth", description = "Registration and token issuance"),
        (name = "files", description = "Upload, list, download and delete the caller's files"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
