//! Test helpers: an API server over the in-memory registry and object store.
//!
//! Run with `cargo test -p stowage-api`. No external services are needed.

pub mod auth;

use axum_test::TestServer;
use std::collections::HashMap;
use std::sync::Arc;
use stowage_api::auth::AuthState;
use stowage_api::constants;
use stowage_api::setup::{routes, services};
use stowage_api::state::AppState;
use stowage_core::Config;
use stowage_db::MemoryConfigStore;
use stowage_services::{Auditor, MemoryAuditSink};
use stowage_storage::{MemoryClientFactory, MemoryStore};

/// API path with the version prefix, e.g. `/api/v1/configs`.
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub store: MemoryStore,
    pub audit: Arc<MemoryAuditSink>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", auth::TEST_JWT_SECRET),
        ("ADMIN_USER_IDS", auth::ALLOW_LISTED_ADMIN),
    ]);
    Config::from_vars(|key| vars.get(key).map(|v| v.to_string()))
        .expect("Failed to build test config")
}

pub async fn setup_test_app() -> TestApp {
    let config = test_config();
    let store = MemoryStore::new();
    let audit = Arc::new(MemoryAuditSink::new(256));

    let manager = services::build_manager(
        &config,
        Arc::new(MemoryConfigStore::new()),
        Arc::new(MemoryClientFactory::new(store.clone())),
        None,
        Auditor::new(audit.clone()),
    );

    let state = Arc::new(AppState {
        manager,
        auth: Arc::new(AuthState::new(
            &config.jwt_secret,
            config.admin_user_ids.clone(),
        )),
        pool: None,
        max_upload_size_bytes: config.max_upload_size_bytes,
        cors_origins: config.cors_origins.clone(),
    });

    let router = routes::setup_routes(state).expect("Failed to build routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        store,
        audit,
    }
}

/// JSON body for a self-hosted configuration pointing at `bucket`.
pub fn config_body(name: &str, bucket: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "backend_kind": "self_hosted",
        "access_key_id": "minioadmin",
        "secret_access_key": "minio-secret-key",
        "region": "",
        "bucket_name": bucket,
        "endpoint_url": "http://localhost:9000",
        "use_tls": false
    })
}
