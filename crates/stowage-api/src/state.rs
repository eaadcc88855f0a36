//! Shared application state handed to every handler.

use crate::auth::AuthState;
use sqlx::PgPool;
use std::sync::Arc;
use stowage_services::StorageManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: StorageManager,
    pub auth: Arc<AuthState>,
    /// `None` when running on the in-memory registry.
    pub pool: Option<PgPool>,
    pub max_upload_size_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn registry_backend(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
