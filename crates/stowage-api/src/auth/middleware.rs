use crate::auth::models::JwtClaims;
use crate::constants::TRUSTED_PROXY_COUNT;
use crate::error::HttpAppError;
use crate::utils::ip_extraction::extract_client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::net::SocketAddr;
use std::sync::Arc;
use stowage_core::models::{CallContext, Caller};
use stowage_core::{AppError, RequestMeta};
use stowage_storage::keys::validate_owner_id;

/// Verification key plus the operator-configured administrator list.
#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    validation: Validation,
    admin_user_ids: Vec<String>,
}

impl AuthState {
    pub fn new(jwt_secret: &str, admin_user_ids: Vec<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            admin_user_ids,
        }
    }

    /// Verify `token` and build the caller it represents.
    pub fn authenticate(&self, token: &str) -> Result<Caller, AppError> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT verification failed");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?
            .claims;

        if let Err(e) = validate_owner_id(&claims.sub) {
            tracing::debug!(error = %e, "Rejected token subject");
            return Err(AppError::Unauthorized(
                "Token subject is not a valid user id".to_string(),
            ));
        }

        let is_admin =
            claims.has_admin_role() || self.admin_user_ids.iter().any(|id| *id == claims.sub);
        Ok(Caller {
            user_id: claims.sub,
            username: claims.username,
            is_admin,
        })
    }
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

fn request_meta(request: &Request) -> RequestMeta {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    RequestMeta {
        client_ip: extract_client_ip(request.headers(), socket_addr.as_ref(), TRUSTED_PROXY_COUNT),
        user_agent: request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    }
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let meta = request_meta(&request);

    let caller = match bearer_token(&request).and_then(|token| auth_state.authenticate(token)) {
        Ok(caller) => caller,
        Err(e) => {
            tracing::info!(
                client_ip = ?meta.client_ip,
                user_agent = ?meta.user_agent,
                reason = %e,
                "Authentication failed"
            );
            return HttpAppError(e).into_response();
        }
    };

    tracing::debug!(
        user_id = %caller.user_id,
        is_admin = caller.is_admin,
        "Request authenticated"
    );
    request
        .extensions_mut()
        .insert(CallContext::new(caller).with_meta(meta));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret-at-least-32-characters";

    fn token(sub: &str, role: Option<&str>, exp_offset: i64) -> String {
        let claims = JwtClaims {
            sub: sub.to_string(),
            username: Some(format!("{}-name", sub)),
            role: role.map(str::to_string),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_admin_from_role_or_allow_list() {
        let auth = AuthState::new(SECRET, vec!["ops".to_string()]);

        let alice = auth.authenticate(&token("alice", None, 3600)).unwrap();
        assert!(!alice.is_admin);
        assert_eq!(alice.username.as_deref(), Some("alice-name"));

        assert!(auth.authenticate(&token("root", Some("admin"), 3600)).unwrap().is_admin);
        assert!(auth.authenticate(&token("ops", Some("member"), 3600)).unwrap().is_admin);
    }

    #[test]
    fn test_rejects_expired_and_foreign_tokens() {
        let auth = AuthState::new(SECRET, Vec::new());
        assert!(matches!(
            auth.authenticate(&token("alice", None, -3600)),
            Err(AppError::Unauthorized(_))
        ));

        let other = AuthState::new("another-secret-that-is-32-chars-long!!", Vec::new());
        assert!(other.authenticate(&token("alice", None, 3600)).is_err());
        assert!(auth.authenticate("not-a-jwt").is_err());
    }

    #[test]
    fn test_rejects_subjects_that_are_not_one_key_segment() {
        let auth = AuthState::new(SECRET, Vec::new());
        for sub in ["alice/private", "..", " ", "bob\u{7}"] {
            assert!(
                matches!(
                    auth.authenticate(&token(sub, None, 3600)),
                    Err(AppError::Unauthorized(_))
                ),
                "accepted subject {:?}",
                sub
            );
        }
        assert!(auth.authenticate(&token("alice", None, 3600)).is_ok());
    }
}
