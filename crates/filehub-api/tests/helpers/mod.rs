//! Test helpers: build AppState and router for integration tests.
//!
//! Stores are in-memory and files go to a temporary directory, so these
//! tests need neither Postgres nor S3.
#![allow(dead_code)]

pub mod auth;
pub mod fixtures;

use axum_test::TestServer;
use filehub_api::auth::JwtService;
use filehub_api::setup::routes;
use filehub_api::state::AppState;
use filehub_core::{BaseConfig, Config, FileServiceConfig, StorageBackend};
use filehub_db::{FileMetadataStore, InMemoryFileMetadataStore, InMemoryUserStore, UserStore};
use filehub_storage::{FileStorage, LocalStorage, MetadataIndex};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_JWT_SECRET: &str = "test-secret-key-min-32-characters-long-for-testing";

/// Test application: server plus the stores behind it.
pub struct TestApp {
    pub server: TestServer,
    pub metadata: Arc<InMemoryFileMetadataStore>,
    pub users: Arc<InMemoryUserStore>,
    pub storage: Arc<dyn FileStorage>,
    pub jwt: JwtService,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_root(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

pub fn test_config(storage_path: &str, max_file_size_bytes: usize) -> Config {
    Config(Box::new(FileServiceConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 1,
            db_timeout_seconds: 5,
            jwt_secret: TEST_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24,
            environment: "test".to_string(),
        },
        database_url: "postgresql://localhost/filehub_test".to_string(),
        storage_backend: StorageBackend::Local,
        s3_enabled: false,
        local_storage_path: storage_path.to_string(),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        s3_access_key_id: None,
        s3_secret_access_key: None,
        max_file_size_bytes,
        allowed_content_types: vec![
            "application/pdf".to_string(),
            "image/png".to_string(),
            "image/jpeg".to_string(),
        ],
        reconcile_on_startup: false,
    }))
}

/// Setup test app with in-memory stores and local storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(10 * 1024 * 1024).await
}

pub async fn setup_test_app_with_limit(max_file_size_bytes: usize) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage_path = temp_dir
        .path()
        .to_str()
        .expect("Temp dir path is not UTF-8")
        .to_string();
    let config = test_config(&storage_path, max_file_size_bytes);

    let metadata = Arc::new(InMemoryFileMetadataStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let metadata_store: Arc<dyn FileMetadataStore> = metadata.clone();
    let user_store: Arc<dyn UserStore> = users.clone();

    let storage: Arc<dyn FileStorage> = Arc::new(
        LocalStorage::new(&storage_path, MetadataIndex::new(metadata_store.clone()))
            .await
            .expect("Failed to create local storage"),
    );

    let jwt = JwtService::new(config.jwt_secret(), config.jwt_expiry_hours());
    let state = Arc::new(AppState {
        config: config.clone(),
        storage: storage.clone(),
        metadata: metadata_store,
        users: user_store,
        jwt: jwt.clone(),
    });

    let router = routes::setup_routes(&config, state).expect("Failed to setup routes");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        metadata,
        users,
        storage,
        jwt,
        _temp_dir: temp_dir,
    }
}
