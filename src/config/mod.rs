use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub elevation_default_ttl_minutes: i64,
    pub elevation_max_ttl_minutes: i64,
    pub impersonation_default_ttl_minutes: i64,
    pub impersonation_max_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub relay_url: String,
    pub batch_size: usize,
    pub send_timeout_secs: u64,
    pub default_drain_limit: i64,
    pub max_drain_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ELEVATION_DEFAULT_TTL_MINUTES") {
            self.security.elevation_default_ttl_minutes =
                v.parse().unwrap_or(self.security.elevation_default_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_ELEVATION_MAX_TTL_MINUTES") {
            self.security.elevation_max_ttl_minutes =
                v.parse().unwrap_or(self.security.elevation_max_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_IMPERSONATION_DEFAULT_TTL_MINUTES") {
            self.security.impersonation_default_ttl_minutes =
                v.parse().unwrap_or(self.security.impersonation_default_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_IMPERSONATION_MAX_TTL_MINUTES") {
            self.security.impersonation_max_ttl_minutes =
                v.parse().unwrap_or(self.security.impersonation_max_ttl_minutes);
        }

        // Push relay overrides
        if let Ok(v) = env::var("PUSH_RELAY_URL") {
            self.push.relay_url = v;
        }
        if let Ok(v) = env::var("PUSH_BATCH_SIZE") {
            self.push.batch_size = v.parse().unwrap_or(self.push.batch_size);
        }
        if let Ok(v) = env::var("PUSH_SEND_TIMEOUT_SECS") {
            self.push.send_timeout_secs = v.parse().unwrap_or(self.push.send_timeout_secs);
        }
        if let Ok(v) = env::var("PUSH_DEFAULT_DRAIN_LIMIT") {
            self.push.default_drain_limit = v.parse().unwrap_or(self.push.default_drain_limit);
        }
        if let Ok(v) = env::var("PUSH_MAX_DRAIN_LIMIT") {
            self.push.max_drain_limit = v.parse().unwrap_or(self.push.max_drain_limit);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 100,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:19006".to_string(),
                ],
                elevation_default_ttl_minutes: 10,
                elevation_max_ttl_minutes: 30,
                impersonation_default_ttl_minutes: 15,
                impersonation_max_ttl_minutes: 60,
            },
            push: PushConfig {
                relay_url: "http://localhost:4100".to_string(),
                batch_size: 100,
                send_timeout_secs: 10,
                default_drain_limit: 100,
                max_drain_limit: 500,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 100,
                max_request_size_bytes: 512 * 1024, // 512KB
            },
            security: SecurityConfig {
                // Must come from JWT_SECRET; an empty secret refuses every bearer
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.dealboard.app".to_string()],
                elevation_default_ttl_minutes: 10,
                elevation_max_ttl_minutes: 30,
                impersonation_default_ttl_minutes: 15,
                impersonation_max_ttl_minutes: 60,
            },
            push: PushConfig {
                relay_url: "https://push-staging.dealboard.app".to_string(),
                batch_size: 100,
                send_timeout_secs: 10,
                default_drain_limit: 100,
                max_drain_limit: 500,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                default_page_size: 50,
                max_page_size: 100,
                max_request_size_bytes: 256 * 1024, // 256KB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                cors_origins: vec!["https://dealboard.app".to_string()],
                elevation_default_ttl_minutes: 10,
                elevation_max_ttl_minutes: 30,
                impersonation_default_ttl_minutes: 15,
                impersonation_max_ttl_minutes: 60,
            },
            push: PushConfig {
                relay_url: "https://push.dealboard.app".to_string(),
                batch_size: 100,
                send_timeout_secs: 10,
                default_drain_limit: 100,
                max_drain_limit: 500,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macros for common checks
#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
