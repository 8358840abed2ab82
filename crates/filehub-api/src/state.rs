//! Application state shared by all handlers.

use crate::auth::JwtService;
use filehub_core::Config;
use filehub_db::{FileMetadataStore, UserStore};
use filehub_storage::FileStorage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Backend selected at startup; every file operation goes through it
    pub storage: Arc<dyn FileStorage>,
    pub metadata: Arc<dyn FileMetadataStore>,
    pub users: Arc<dyn UserStore>,
    pub jwt: JwtService,
}
