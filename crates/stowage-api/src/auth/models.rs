use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use stowage_core::models::CallContext;
use stowage_core::AppError;

/// Role claim value that grants administrator rights.
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims accepted by the API. Tokens are issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id; becomes the owner id of everything the caller creates.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
}

impl JwtClaims {
    pub fn has_admin_role(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
    }
}

/// Call context placed in request extensions by `auth_middleware`.
///
/// Implemented as `FromRequestParts` so it can sit in front of `Multipart` in handler
/// signatures.
#[derive(Debug, Clone)]
pub struct AuthContext(pub CallContext);

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallContext>()
            .cloned()
            .map(AuthContext)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authentication context".to_string(),
                ))
            })
    }
}
