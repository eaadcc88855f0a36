//! Storage configuration API tests.

mod helpers;

use helpers::auth::{bearer, token_for};
use helpers::{api_path, config_body, setup_test_app};
use serde_json::Value;

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_test_app().await;
    let response = app.client().get(&api_path("/health")).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["registry"], "memory");
    assert_eq!(body["provisioning"], false);
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get(&api_path("/configs")).await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = client
        .get(&api_path("/configs"))
        .add_header("Authorization", "Bearer not-a-token")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_create_list_get_and_redaction() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .json(&config_body("local", "alice-files"))
        .await;
    assert_eq!(response.status_code(), 201);
    let created: Value = response.json();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["is_default"], true);
    assert_ne!(created["secret_access_key"], "minio-secret-key");

    let listed: Value = client
        .get(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .await
        .json();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0]["secret_access_key"]
        .as_str()
        .unwrap()
        .contains("minio-secret-key"));

    let own: Value = client
        .get(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", bearer("alice"))
        .await
        .json();
    assert_eq!(own["secret_access_key"], "minio-secret-key");

    let stranger = client
        .get(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", bearer("mallory"))
        .await;
    assert_eq!(stranger.status_code(), 403);

    let admin = client
        .get(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", format!("Bearer {}", token_for("root", Some("admin"))))
        .await;
    assert_eq!(admin.status_code(), 200);
}

#[tokio::test]
async fn test_create_rejects_invalid_and_unreachable() {
    let app = setup_test_app().await;
    let client = app.client();

    let mut missing_endpoint = config_body("local", "alice-files");
    missing_endpoint["endpoint_url"] = Value::Null;
    let response = client
        .post(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .json(&missing_endpoint)
        .await;
    assert_eq!(response.status_code(), 400);

    let response = client
        .post(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .json(&serde_json::json!({ "name": "" }))
        .await;
    assert_eq!(response.status_code(), 400);

    app.store.set_unreachable("offline").await;
    let response = client
        .post(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .json(&config_body("offline", "offline"))
        .await;
    assert_eq!(response.status_code(), 502);
    let body: Value = response.json();
    assert_eq!(body["code"], "BACKEND_OPERATION_FAILED");

    let listed: Value = client
        .get(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .await
        .json();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_default_lifecycle() {
    let app = setup_test_app().await;
    let client = app.client();

    let mut ids = Vec::new();
    for bucket in ["first", "second"] {
        let created: Value = client
            .post(&api_path("/configs"))
            .add_header("Authorization", bearer("alice"))
            .json(&config_body(bucket, bucket))
            .await
            .json();
        ids.push(created["id"].as_str().unwrap().to_string());
    }

    let response = client
        .post(&api_path(&format!("/configs/{}/default", ids[1])))
        .add_header("Authorization", bearer("alice"))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["is_default"], true);

    let response = client
        .delete(&api_path(&format!("/configs/{}", ids[1])))
        .add_header("Authorization", bearer("alice"))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["promoted_default"], ids[0].as_str());

    let response = client
        .delete(&api_path(&format!("/configs/{}", ids[0])))
        .add_header("Authorization", bearer("alice"))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["code"], "LAST_CONFIG");
}

#[tokio::test]
async fn test_update_keeps_secret_when_blank() {
    let app = setup_test_app().await;
    let client = app.client();

    let created: Value = client
        .post(&api_path("/configs"))
        .add_header("Authorization", bearer("alice"))
        .json(&config_body("local", "alice-files"))
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();

    let response = client
        .put(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", bearer("alice"))
        .json(&serde_json::json!({ "name": "renamed", "secret_access_key": "" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let own: Value = client
        .get(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", bearer("alice"))
        .await
        .json();
    assert_eq!(own["name"], "renamed");
    assert_eq!(own["secret_access_key"], "minio-secret-key");

    let response = client
        .put(&api_path(&format!("/configs/{}", id)))
        .add_header("Authorization", bearer("bob"))
        .json(&serde_json::json!({ "name": "stolen" }))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_provision_without_admin_backend() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .post(&api_path("/configs/provision"))
        .add_header("Authorization", bearer("alice"))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = setup_test_app().await;
    let response = app.client().get("/api-docs/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/api/v1/configs"].is_object());
}
