//! OpenAPI documentation.

use crate::error;
use crate::handlers;
use stowage_core::models;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "Per-tenant S3-compatible storage configurations and file transfer. All endpoints are versioned under /api/v1/."
    ),
    paths(
        handlers::health::health_check,
        handlers::configs::list_configs,
        handlers::configs::create_config,
        handlers::configs::get_config,
        handlers::configs::update_config,
        handlers::configs::delete_config,
        handlers::configs::set_default_config,
        handlers::configs::provision_config,
        handlers::files::list_files,
        handlers::files::upload_file,
        handlers::files::download_file,
        handlers::files::delete_file,
        handlers::admin::export_configs,
        handlers::admin::import_configs,
    ),
    components(
        schemas(
            models::BackendKind,
            models::StorageConfig,
            models::StorageConfigDraft,
            models::StorageConfigPatch,
            models::StorageConfigView,
            models::FileEntry,
            models::FileListing,
            models::UploadOutcome,
            models::UploadStrategy,
            models::TransferStage,
            handlers::configs::DeleteConfigResponse,
            handlers::files::UploadForm,
            handlers::admin::ImportResponse,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service health"),
        (name = "configs", description = "Storage configuration management"),
        (name = "files", description = "File listing, upload, download and deletion"),
        (name = "admin", description = "Bulk export and import of configurations")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = get_openapi_spec();
        for path in [
            "/api/v1/health",
            "/api/v1/configs",
            "/api/v1/configs/{id}",
            "/api/v1/configs/{id}/default",
            "/api/v1/configs/provision",
            "/api/v1/files",
            "/api/v1/files/{key}",
            "/api/v1/admin/configs/export",
            "/api/v1/admin/configs/import",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
