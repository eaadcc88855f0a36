//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::Result;
use std::sync::Arc;
use stowage_core::Config;

/// Initialize telemetry, persistence, services and routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_format)?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = match &config.database_url {
        Some(url) => Some(database::setup_database(&config, url).await?),
        None => None,
    };

    let state = services::initialize_services(&config, pool)?;
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}
