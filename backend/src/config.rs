use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use dotenvy::dotenv;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub addr: String,
    pub port: u16,
    pub cors_origin: String,
    /// Directory served for any path outside the API.
    pub static_dir: String,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_minutes: i64,
    pub refresh_token_expires_days: i64,
}

// Keep the secret out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expires_minutes", &self.access_token_expires_minutes)
            .field("refresh_token_expires_days", &self.refresh_token_expires_days)
            .finish()
    }
}

/// Per-IP limits applied to the auth routes.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                addr: "127.0.0.1".to_string(),
                port: 8080,
                cors_origin: "http://localhost:5173".to_string(),
                static_dir: "backend/static".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://coursework.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                access_token_expires_minutes: 15,
                refresh_token_expires_days: 7,
            },
            rate_limit: RateLimitConfig {
                per_second: 2,
                burst_size: 10,
            },
        }
    }
}

impl AppConfig {
    /// Built-in defaults, then `Config.toml`, then `APP_`-prefixed environment
    /// variables (`APP_DATABASE__URL`, `APP_JWT__SECRET`, ...).
    pub fn from_env() -> Result<Self, figment::Error> {
        dotenv().ok();

        let config: Self = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("Config.toml")) // For non-sensitive defaults
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        if config.jwt.secret.is_empty() {
            return Err(figment::Error::from(
                "APP_JWT__SECRET must be set to a non-empty value".to_string(),
            ));
        }

        tracing::info!("Configuration loaded successfully: {:?}", config);

        Ok(config)
    }
}
