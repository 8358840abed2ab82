use crate::auth::jwt::JwtService;
use crate::auth::models::UserContext;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use filehub_core::AppError;
use filehub_db::UserStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub users: Arc<dyn UserStore>,
}

/// Resolve the bearer token to a user and attach a `UserContext`.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return HttpAppError(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ))
        .into_response();
    };

    let claims = match auth_state.jwt.validate(token.trim()) {
        Ok(claims) => claims,
        Err(e) => return HttpAppError(e).into_response(),
    };

    // tokens outlive deleted accounts
    match auth_state.users.find_by_id(claims.sub).await {
        Ok(Some(user)) => {
            tracing::debug!(user_id = %user.id, "Request authenticated");
            request.extensions_mut().insert(UserContext {
                user_id: user.id,
                email: user.email,
            });
            next.run(request).await
        }
        Ok(None) => HttpAppError(AppError::Unauthorized("Unknown user".to_string())).into_response(),
        Err(e) => HttpAppError(e).into_response(),
    }
}
