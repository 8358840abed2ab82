//! Configuration module
//!
//! Configuration is read from the environment (with `.env` support) once at
//! startup and validated before any component is built.

use std::env;

use crate::constants::DEFAULT_ALLOWED_CONTENT_TYPES;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;
const MAX_FILE_SIZE_MB: usize = 10;
const LOCAL_STORAGE_PATH: &str = "uploads";

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
}

/// File service configuration
#[derive(Clone, Debug)]
pub struct FileServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage selection: the object store is used only when the
    // discriminator says so and the enabled flag is set.
    pub storage_backend: StorageBackend,
    pub s3_enabled: bool,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub aws_region: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    // Upload limits
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub reconcile_on_startup: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<FileServiceConfig>);

impl Config {
    fn inner(&self) -> &FileServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.inner().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = FileServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Backend every file operation is routed to for the process lifetime.
    pub fn effective_storage_backend(&self) -> StorageBackend {
        self.inner().effective_storage_backend()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.inner().base.jwt_expiry_hours
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_enabled(&self) -> bool {
        self.inner().s3_enabled
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().local_storage_path
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn s3_access_key_id(&self) -> Option<&str> {
        self.inner().s3_access_key_id.as_deref()
    }

    pub fn s3_secret_access_key(&self) -> Option<&str> {
        self.inner().s3_secret_access_key.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn reconcile_on_startup(&self) -> bool {
        self.inner().reconcile_on_startup
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

impl FileServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            environment,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let config = FileServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_enabled: env_flag("S3_ENABLED", false),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION").ok().filter(|s| !s.is_empty()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok().filter(|s| !s.is_empty()),
            s3_access_key_id: env::var("S3_ACCESS_KEY_ID").ok().filter(|s| !s.is_empty()),
            s3_secret_access_key: env::var("S3_SECRET_ACCESS_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            max_file_size_bytes: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            allowed_content_types: env::var("ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_CONTENT_TYPES.to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            reconcile_on_startup: env_flag("RECONCILE_ON_STARTUP", false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn effective_storage_backend(&self) -> StorageBackend {
        match self.storage_backend {
            StorageBackend::S3 if self.s3_enabled => StorageBackend::S3,
            _ => StorageBackend::Local,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES must list at least one content type"
            ));
        }

        match self.effective_storage_backend() {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
                if self.s3_access_key_id.is_some() != self.s3_secret_access_key.is_some() {
                    return Err(anyhow::anyhow!(
                        "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must not be empty when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
