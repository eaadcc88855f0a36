//! Object transfer inside the caller's namespace.

use crate::auth::AuthContext;
use crate::constants::UPLOAD_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use stowage_core::constants::MULTIPART_THRESHOLD_BYTES;
use stowage_core::models::{FileListing, PageRequest, UploadOutcome};
use stowage_core::AppError;
use tokio_util::io::StreamReader;
use utoipa::{IntoParams, ToSchema};

/// Selects a configuration other than the caller's default.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConfigQuery {
    pub config_id: Option<String>,
}

/// Listing query. Pagination values that do not parse are treated as absent.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    pub config_id: Option<String>,
    /// Page number, starting at 1
    #[param(value_type = Option<i64>)]
    pub page: Option<String>,
    /// Items per page, 1 to 100 (default 10)
    #[param(value_type = Option<i64>)]
    pub page_size: Option<String>,
}

/// Multipart upload form.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "One page of the caller's files", body = FileListing),
        (status = 404, description = "No storage configuration", body = ErrorResponse),
        (status = 502, description = "Backend listing failed", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<ListFilesQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = PageRequest::clamped(
        parse_number(query.page.as_deref()),
        parse_number(query.page_size.as_deref()),
    );
    let listing = state
        .manager
        .transfer()
        .list_files(&ctx, query.config_id.as_deref(), page)
        .await?;
    Ok(Json(listing))
}

#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    params(ConfigQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadOutcome),
        (status = 400, description = "Missing file field or bad file name", body = ErrorResponse),
        (status = 502, description = "Backend rejected a transfer stage", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx, headers, multipart), fields(owner_id = %ctx.owner_id()))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Query(query): Query<ConfigQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    // The request length bounds the file length; without it, assume a large upload.
    let size_hint = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(MULTIPART_THRESHOLD_BYTES);

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no file name".to_string()))?;
        let content_type = field.content_type().map(str::to_string);

        let stream = field.map_err(|e| std::io::Error::other(e.to_string()));
        let mut reader = StreamReader::new(Box::pin(stream));

        let outcome = state
            .manager
            .transfer()
            .upload(
                &ctx,
                query.config_id.as_deref(),
                &filename,
                &mut reader,
                size_hint,
                content_type,
            )
            .await?;
        return Ok((StatusCode::CREATED, Json(outcome)));
    }

    Err(AppError::InvalidInput(format!("Missing multipart field '{}'", UPLOAD_FIELD)).into())
}

/// `Content-Disposition` value with characters that would break the quoted string removed.
fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{key}",
    tag = "files",
    params(
        ("key" = String, Path, description = "File name inside the caller's namespace"),
        ConfigQuery
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 502, description = "Backend download failed", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(owner_id = %ctx.owner_id()))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(key): Path<String>,
    Query(query): Query<ConfigQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let download = state
        .manager
        .transfer()
        .download(&ctx, query.config_id.as_deref(), &key)
        .await?;

    let content_type = download
        .object
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(download.filename()),
        );
    if let Some(length) = download.object.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    let response = builder
        .body(Body::from_stream(download.object.body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;
    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{key}",
    tag = "files",
    params(
        ("key" = String, Path, description = "File name inside the caller's namespace"),
        ConfigQuery
    ),
    responses(
        (status = 204, description = "File deleted (or was already absent)"),
        (status = 502, description = "Backend delete failed", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip(state, ctx), fields(owner_id = %ctx.owner_id()))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthContext(ctx): AuthContext,
    Path(key): Path<String>,
    Query(query): Query<ConfigQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .manager
        .transfer()
        .delete(&ctx, query.config_id.as_deref(), &key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_disposition_strips_quotes() {
        assert_eq!(
            attachment_disposition("re\"port.csv"),
            "attachment; filename=\"report.csv\""
        );
    }

    #[test]
    fn test_parse_number_ignores_garbage() {
        assert_eq!(parse_number(Some(" 3 ")), Some(3));
        assert_eq!(parse_number(Some("abc")), None);
        assert_eq!(parse_number(None), None);
    }
}
