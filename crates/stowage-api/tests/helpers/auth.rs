use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use stowage_api::auth::JwtClaims;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// User id granted admin rights through `ADMIN_USER_IDS`.
pub const ALLOW_LISTED_ADMIN: &str = "ops-admin";

pub fn token_for(user_id: &str, role: Option<&str>) -> String {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        username: Some(format!("{}@example.com", user_id)),
        role: role.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn bearer(user_id: &str) -> String {
    format!("Bearer {}", token_for(user_id, None))
}

pub fn admin_bearer() -> String {
    format!("Bearer {}", token_for("root", Some("admin")))
}
