//! Administrator-only bulk export and import of storage configurations.

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::AppError;
use stowage_services::BulkFormat;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FormatQuery {
    /// `csv` (default) or `json`
    pub format: Option<String>,
}

impl FormatQuery {
    fn bulk_format(&self) -> Result<BulkFormat, AppError> {
        self.format.as_deref().unwrap_or("").parse()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    pub imported: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/configs/export",
    tag = "admin",
    params(FormatQuery),
    responses(
        (status = 200, description = "Every configuration, secrets included", content_type = "text/csv"),
        (status = 403, description = "Caller is not an administrator", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.caller.user_id))]
pub async fn export_configs(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<FormatQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let format = query.bulk_format()?;
    let export = state.manager.export(&ctx, format).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", format.file_name()),
        )
        .body(Body::from(export.body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/configs/import",
    tag = "admin",
    params(FormatQuery),
    request_body(content = String, description = "CSV or JSON export payload", content_type = "text/csv"),
    responses(
        (status = 200, description = "Records upserted by id", body = ImportResponse),
        (status = 400, description = "Payload could not be parsed", body = ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx, body), fields(user_id = %ctx.caller.user_id, bytes = body.len()))]
pub async fn import_configs(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<FormatQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let format = query.bulk_format()?;
    let imported = state.manager.import(&ctx, format, &body).await?;
    Ok(Json(ImportResponse { imported }))
}
