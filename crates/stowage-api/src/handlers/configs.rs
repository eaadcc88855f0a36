//! Storage configuration CRUD, default selection and provisioning.

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::models::{StorageConfig, StorageConfigDraft, StorageConfigPatch, StorageConfigView};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteConfigResponse {
    pub deleted: String,
    /// Configuration that became the default because the deleted one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_default: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/configs",
    tag = "configs",
    responses(
        (status = 200, description = "Caller's configurations, secrets masked", body = Vec<StorageConfigView>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let configs = state.manager.registry().list(ctx.owner_id()).await?;
    Ok(Json(configs))
}

#[utoipa::path(
    post,
    path = "/api/v1/configs",
    tag = "configs",
    request_body = StorageConfigDraft,
    responses(
        (status = 201, description = "Configuration verified and created", body = StorageConfigView),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 502, description = "Backend unreachable with these settings", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx, draft), fields(owner_id = %ctx.owner_id()))]
pub async fn create_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    ValidatedJson(draft): ValidatedJson<StorageConfigDraft>,
) -> Result<impl IntoResponse, HttpAppError> {
    let created = state.manager.create_config(&ctx, draft).await?;
    Ok((StatusCode::CREATED, Json(created.redacted())))
}

#[utoipa::path(
    get,
    path = "/api/v1/configs/{id}",
    tag = "configs",
    params(("id" = String, Path, description = "Configuration ID")),
    responses(
        (status = 200, description = "Full configuration including the secret", body = StorageConfig),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Configuration not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let config = state.manager.registry().get(&ctx, &id).await?;
    Ok(Json(config))
}

#[utoipa::path(
    put,
    path = "/api/v1/configs/{id}",
    tag = "configs",
    params(("id" = String, Path, description = "Configuration ID")),
    request_body = StorageConfigPatch,
    responses(
        (status = 200, description = "Configuration updated", body = StorageConfigView),
        (status = 404, description = "Configuration not found", body = ErrorResponse),
        (status = 502, description = "Backend unreachable with the new settings", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx, patch), fields(owner_id = %ctx.owner_id()))]
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
    ValidatedJson(patch): ValidatedJson<StorageConfigPatch>,
) -> Result<impl IntoResponse, HttpAppError> {
    let updated = state.manager.update_config(&ctx, &id, patch).await?;
    Ok(Json(updated.redacted()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/configs/{id}",
    tag = "configs",
    params(("id" = String, Path, description = "Configuration ID")),
    responses(
        (status = 200, description = "Configuration deleted", body = DeleteConfigResponse),
        (status = 404, description = "Configuration not found", body = ErrorResponse),
        (status = 409, description = "Last remaining configuration", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(owner_id = %ctx.owner_id()))]
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let promoted_default = state.manager.delete_config(&ctx, &id).await?;
    Ok(Json(DeleteConfigResponse {
        deleted: id,
        promoted_default,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/configs/{id}/default",
    tag = "configs",
    params(("id" = String, Path, description = "Configuration ID")),
    responses(
        (status = 200, description = "Configuration is now the default", body = StorageConfigView),
        (status = 404, description = "Configuration not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn set_default_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let config = state.manager.set_default(&ctx, &id).await?;
    Ok(Json(config.redacted()))
}

#[utoipa::path(
    post,
    path = "/api/v1/configs/provision",
    tag = "configs",
    responses(
        (status = 201, description = "Bucket provisioned and set as default", body = StorageConfigView),
        (status = 400, description = "Provisioning is not configured", body = ErrorResponse),
        (status = 502, description = "Managed backend failure", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn provision_config(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let config = state.manager.provision(&ctx).await?;
    Ok((StatusCode::CREATED, Json(config.redacted())))
}
