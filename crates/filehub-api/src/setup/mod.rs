//! Application setup and initialization
//!
//! Everything main.rs needs to go from a `Config` to a running router.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::auth::JwtService;
use crate::state::AppState;
use anyhow::{Context, Result};
use filehub_core::Config;
use filehub_db::{FileMetadataStore, PgFileMetadataRepository, PgUserRepository, UserStore};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let metadata: Arc<dyn FileMetadataStore> =
        Arc::new(PgFileMetadataRepository::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserRepository::new(pool));

    let storage = storage::setup_storage(&config, metadata.clone()).await?;

    let state = Arc::new(AppState {
        jwt: JwtService::new(config.jwt_secret(), config.jwt_expiry_hours()),
        config: config.clone(),
        storage,
        metadata,
        users,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
