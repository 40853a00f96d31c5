use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub insight: InsightConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Where the service keeps its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(StoreBackend::Postgres),
            "memory" | "mem" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub backend: StoreBackend,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

/// Upper bound for session lifetime; larger values are clamped to it.
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Marks the session cookie `Secure`.
    pub require_https: bool,
    #[serde(skip_serializing, default)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

pub const DEFAULT_SESSION_COOKIE: &str = "brandhub_session";
const DEVELOPMENT_JWT_SECRET: &str = "brandhub-development-secret";
const DEFAULT_INSIGHT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_INSIGHT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = lookup("BRANDHUB_STORE") {
            self.database.backend = StoreBackend::parse(&v).unwrap_or(self.database.backend);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = lookup("BRANDHUB_PORT").or_else(|| lookup("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = lookup("SECURITY_JWT_EXPIRY_HOURS") {
            let hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
            self.security.jwt_expiry_hours = hours.min(MAX_JWT_EXPIRY_HOURS);
        }
        if let Some(v) = lookup("SESSION_COOKIE_NAME") {
            if !v.trim().is_empty() {
                self.security.session_cookie = v.trim().to_string();
            }
        }

        // Insight overrides
        if let Some(v) = lookup("GOOGLE_GENERATIVE_AI_API_KEY") {
            self.insight.api_key = Some(v).filter(|key| !key.trim().is_empty());
        }
        if let Some(v) = lookup("INSIGHT_MODEL") {
            self.insight.model = v;
        }
        if let Some(v) = lookup("INSIGHT_ENDPOINT") {
            self.insight.endpoint = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("INSIGHT_TIMEOUT_SECS") {
            self.insight.timeout_secs = v.parse().unwrap_or(self.insight.timeout_secs);
        }

        self
    }

    /// Reject configurations the server must not start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.security.jwt_secret.trim().is_empty() && self.environment != Environment::Development {
            anyhow::bail!("JWT_SECRET must be set outside development");
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when BRANDHUB_STORE=postgres");
        }
        if self.security.jwt_expiry_hours == 0 {
            anyhow::bail!("SECURITY_JWT_EXPIRY_HOURS must be at least 1");
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                require_https: false,
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            },
            insight: InsightConfig {
                api_key: None,
                model: DEFAULT_INSIGHT_MODEL.to_string(),
                endpoint: DEFAULT_INSIGHT_ENDPOINT.to_string(),
                timeout_secs: 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.brandhub.app".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            },
            insight: InsightConfig {
                api_key: None,
                model: DEFAULT_INSIGHT_MODEL.to_string(),
                endpoint: DEFAULT_INSIGHT_ENDPOINT.to_string(),
                timeout_secs: 30,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                backend: StoreBackend::Postgres,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.brandhub.app".to_string()],
                require_https: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            },
            insight: InsightConfig {
                api_key: None,
                model: DEFAULT_INSIGHT_MODEL.to_string(),
                endpoint: DEFAULT_INSIGHT_ENDPOINT.to_string(),
                timeout_secs: 30,
            },
        }
    }

    /// Development defaults with the in-memory store; used by tests and `serve --memory`.
    pub fn in_memory() -> Self {
        let mut config = Self::development();
        config.database.backend = StoreBackend::Memory;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_development_config() {
        let config = from_map(&[]);
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.security.require_https);
        assert_eq!(config.security.session_cookie, "brandhub_session");
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = from_map(&[("APP_ENV", "prod")]);
        assert_eq!(config.environment, Environment::Production);
        assert!(config.security.require_https);
        assert!(config.security.jwt_secret.is_empty());
    }

    #[test]
    fn overrides_replace_preset_values() {
        let config = from_map(&[
            ("BRANDHUB_STORE", "memory"),
            ("PORT", "8088"),
            ("SECURITY_CORS_ORIGINS", "https://a.test, https://b.test,"),
            ("INSIGHT_ENDPOINT", "http://127.0.0.1:9999/v1/"),
            ("DATABASE_MAX_CONNECTIONS", "not-a-number"),
        ]);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.api.port, 8088);
        assert_eq!(config.security.cors_origins, vec!["https://a.test", "https://b.test"]);
        assert_eq!(config.insight.endpoint, "http://127.0.0.1:9999/v1");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn production_requires_secret() {
        let config = from_map(&[("APP_ENV", "production"), ("DATABASE_URL", "postgres://localhost/brandhub")]);
        assert!(config.validate().is_err());

        let config = from_map(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://localhost/brandhub"),
            ("JWT_SECRET", "s3cret"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_backend_requires_url() {
        assert!(from_map(&[]).validate().is_err());
        assert!(from_map(&[("BRANDHUB_STORE", "memory")]).validate().is_ok());
    }

    #[test]
    fn oversized_expiry_is_clamped() {
        let config = from_map(&[("SECURITY_JWT_EXPIRY_HOURS", "18446744073709551615")]);
        assert_eq!(config.security.jwt_expiry_hours, MAX_JWT_EXPIRY_HOURS);
        let config = from_map(&[("SECURITY_JWT_EXPIRY_HOURS", "48")]);
        assert_eq!(config.security.jwt_expiry_hours, 48);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = from_map(&[("GOOGLE_GENERATIVE_AI_API_KEY", "  ")]);
        assert!(config.insight.api_key.is_none());
    }
}
