//! Route configuration and setup

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the full router: public and authenticated routes plus the shared middleware stack.
pub fn setup_routes(state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(&state.cors_origins)?;

    let protected = protected_routes().layer(axum::middleware::from_fn_with_state(
        state.auth.clone(),
        crate::auth::auth_middleware,
    ));

    let app = public_routes()
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(state.max_upload_size_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(origins: &[String]) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/health", API_PREFIX),
            get(handlers::health::health_check),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(config_routes())
        .merge(file_routes())
        .merge(admin_routes())
}

fn config_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/configs", API_PREFIX),
            get(handlers::configs::list_configs).post(handlers::configs::create_config),
        )
        .route(
            &format!("{}/configs/provision", API_PREFIX),
            post(handlers::configs::provision_config),
        )
        .route(
            &format!("{}/configs/{{id}}", API_PREFIX),
            get(handlers::configs::get_config)
                .put(handlers::configs::update_config)
                .delete(handlers::configs::delete_config),
        )
        .route(
            &format!("{}/configs/{{id}}/default", API_PREFIX),
            post(handlers::configs::set_default_config),
        )
}

fn file_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/files", API_PREFIX),
            get(handlers::files::list_files)
                .post(handlers::files::upload_file)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(
            &format!("{}/files/{{*key}}", API_PREFIX),
            get(handlers::files::download_file).delete(handlers::files::delete_file),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/admin/configs/export", API_PREFIX),
            get(handlers::admin::export_configs),
        )
        .route(
            &format!("{}/admin/configs/import", API_PREFIX),
            post(handlers::admin::import_configs).layer(DefaultBodyLimit::disable()),
        )
}
