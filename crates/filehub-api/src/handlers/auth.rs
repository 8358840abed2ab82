//! Registration and login

use crate::auth::models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use filehub_core::models::NewUser;
use filehub_core::AppError;
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "register"))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), HttpAppError> {
    let email = request.email.trim().to_lowercase();

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()).into());
    }

    let user = state
        .users
        .create(NewUser {
            email,
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "login"))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, HttpAppError> {
    let user = state
        .users
        .find_by_email(request.email.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&request.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()).into());
    }

    state.users.record_login(user.id).await?;
    let token = state.jwt.issue(user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in(),
        user_id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
    }))
}
