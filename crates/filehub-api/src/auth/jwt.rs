//! HS256 token issuing and validation.

use crate::auth::models::JwtClaims;
use chrono::{Duration, Utc};
use filehub_core::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.expiry_hours * 3600
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.expiry_hours)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Token has expired".to_string())
                    }
                    _ => AppError::Unauthorized("Invalid or expired token".to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    #[test]
    fn test_issue_then_validate() {
        let service = JwtService::new(SECRET, 24);
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id, "ada@example.com").unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(service.expires_in(), 24 * 3600);
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let issuer = JwtService::new("another-secret-key-that-is-32-chars-long", 24);
        let token = issuer.issue(Uuid::new_v4(), "a@b.c").unwrap();

        let err = JwtService::new(SECRET, 24).validate(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_rejects_expired_token() {
        let service = JwtService::new(SECRET, -1);
        let token = service.issue(Uuid::new_v4(), "a@b.c").unwrap();

        let err = service.validate(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg.contains("expired")));
    }
}
