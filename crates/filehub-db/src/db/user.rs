//! User repository: accounts for registration and login.

use chrono::{DateTime, Utc};
use filehub_core::models::{NewUser, User};
use filehub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn record_login(&self, id: Uuid) -> Result<(), AppError>;
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, created_at, updated_at, last_login_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserRepository {
    #[tracing::instrument(skip(self, user), fields(db.table = "users"))]
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let result = sqlx::query_as::<Postgres, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into_user()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::Conflict(format!("Email '{}' is already registered", user.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self, email), fields(db.table = "users"))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as::<Postgres, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.user_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as::<Postgres, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.user_id = %id))]
    async fn record_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
