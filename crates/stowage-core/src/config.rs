//! Configuration module
//!
//! Process configuration is read once from the environment (with `.env` support) and then
//! passed around by value. Admin backend credentials for provisioning live in
//! `AdminBackendConfig` and are threaded explicitly into the provisioner.

use std::env;

const SERVER_PORT: u16 = 8081;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CLIENT_CACHE_CAPACITY: usize = 64;
const MAX_UPLOAD_SIZE_MB: usize = 5120;
const PROVISION_BUCKET_PREFIX: &str = "stowage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Credentials and endpoint of the self-hosted backend used for auto-provisioning.
#[derive(Clone)]
pub struct AdminBackendConfig {
    pub endpoint: String,
    pub region: String,
    pub use_tls: bool,
    pub admin_access_key: String,
    pub admin_secret_key: String,
    /// Credentials handed to tenants for provisioned buckets.
    pub service_access_key: String,
    pub service_secret_key: String,
    pub bucket_prefix: String,
}

impl std::fmt::Debug for AdminBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBackendConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("use_tls", &self.use_tls)
            .field("bucket_prefix", &self.bucket_prefix)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub encryption_key: Option<String>,
    pub jwt_secret: String,
    pub admin_user_ids: Vec<String>,
    pub client_cache_capacity: usize,
    pub max_upload_size_bytes: usize,
    pub log_format: LogFormat,
    pub admin_backend: Option<AdminBackendConfig>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(|s| s.trim().to_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins = split_list(&var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string()));

        let server_port = var("PORT")
            .or_else(|| var("SERVER_PORT"))
            .unwrap_or_else(|| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let jwt_secret =
            var("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?;

        let max_upload_size_mb = var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let admin_backend = match (
            var("ADMIN_BACKEND_ENDPOINT"),
            var("ADMIN_BACKEND_ACCESS_KEY"),
            var("ADMIN_BACKEND_SECRET_KEY"),
        ) {
            (Some(endpoint), Some(admin_access_key), Some(admin_secret_key))
                if !endpoint.trim().is_empty() =>
            {
                Some(AdminBackendConfig {
                    endpoint: endpoint.trim().to_string(),
                    region: var("ADMIN_BACKEND_REGION")
                        .unwrap_or_else(|| crate::constants::FALLBACK_REGION.to_string()),
                    use_tls: parse_bool(var("ADMIN_BACKEND_USE_TLS"), false),
                    service_access_key: var("PROVISION_ACCESS_KEY")
                        .unwrap_or_else(|| admin_access_key.clone()),
                    service_secret_key: var("PROVISION_SECRET_KEY")
                        .unwrap_or_else(|| admin_secret_key.clone()),
                    admin_access_key,
                    admin_secret_key,
                    bucket_prefix: var("PROVISION_BUCKET_PREFIX")
                        .unwrap_or_else(|| PROVISION_BUCKET_PREFIX.to_string()),
                })
            }
            _ => None,
        };

        let config = Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port,
            environment,
            cors_origins,
            database_url: var("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            encryption_key: var("ENCRYPTION_KEY").filter(|s| !s.trim().is_empty()),
            jwt_secret,
            admin_user_ids: split_list(&var("ADMIN_USER_IDS").unwrap_or_default()),
            client_cache_capacity: var("CLIENT_CACHE_CAPACITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CLIENT_CACHE_CAPACITY),
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            log_format,
            admin_backend,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
            if self.encryption_key.is_none() {
                return Err(anyhow::anyhow!(
                    "ENCRYPTION_KEY must be set when DATABASE_URL is configured"
                ));
            }
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than zero"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.server_port)
    }

    pub fn is_admin_user(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(config.server_port, 8081);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert!(config.database_url.is_none());
        assert_eq!(config.client_cache_capacity, 64);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert!(config.admin_backend.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        assert!(load(&[("JWT_SECRET", "short")]).is_err());
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_database_requires_encryption_key() {
        let err = load(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://localhost/stowage"),
        ]);
        assert!(err.is_err());

        let ok = load(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://localhost/stowage"),
            ("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        assert!(load(&[("JWT_SECRET", SECRET), ("ENVIRONMENT", "production")]).is_err());
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://app.example.com, https://admin.example.com"),
        ])
        .unwrap();
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_admin_backend_built_only_when_complete() {
        let partial = load(&[
            ("JWT_SECRET", SECRET),
            ("ADMIN_BACKEND_ENDPOINT", "http://minio:9000"),
        ])
        .unwrap();
        assert!(partial.admin_backend.is_none());

        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("ADMIN_BACKEND_ENDPOINT", "http://minio:9000"),
            ("ADMIN_BACKEND_ACCESS_KEY", "minioadmin"),
            ("ADMIN_BACKEND_SECRET_KEY", "minioadmin-secret"),
            ("ADMIN_USER_IDS", "root, ops"),
        ])
        .unwrap();
        let admin = config.admin_backend.clone().unwrap();
        assert_eq!(admin.region, "us-east-1");
        assert!(!admin.use_tls);
        assert_eq!(admin.service_access_key, "minioadmin");
        assert_eq!(admin.bucket_prefix, "stowage");
        assert!(config.is_admin_user("ops"));
        assert!(!config.is_admin_user("alice"));
    }
}
