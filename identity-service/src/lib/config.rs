use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::auth::models::AuthSettings;
use crate::domain::credential::models::LockoutPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Notifications are only logged when absent
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub cooldown_minutes: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown_minutes: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub email_verify_ttl_hours: i64,
    pub password_reset_ttl_hours: i64,
    pub invite_ttl_hours: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            email_verify_ttl_hours: 24,
            password_reset_ttl_hours: 1,
            invite_ttl_hours: 72,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub operation_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_access_ttl_minutes() -> i64 {
    15
}

fn default_refresh_ttl_days() -> i64 {
    7
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, SERVER__HTTP_PORT, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        Ok(config)
    }

    /// Lifetimes, lockout and timeout settings for the auth service.
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            access_ttl_minutes: self.jwt.access_ttl_minutes,
            refresh_ttl_days: self.jwt.refresh_ttl_days,
            lockout: LockoutPolicy {
                max_attempts: self.lockout.max_attempts,
                cooldown: chrono::Duration::minutes(self.lockout.cooldown_minutes),
            },
            email_verify_ttl: chrono::Duration::hours(self.tokens.email_verify_ttl_hours),
            password_reset_ttl: chrono::Duration::hours(self.tokens.password_reset_ttl_hours),
            invite_ttl: chrono::Duration::hours(self.tokens.invite_ttl_hours),
            operation_timeout: std::time::Duration::from_millis(self.auth.operation_timeout_ms),
            ..AuthSettings::default()
        }
    }
}
