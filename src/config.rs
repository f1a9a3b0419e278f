use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Limits for the `store.throttle` guard on mutating routes.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl ThrottleConfig {
    /// A zero window would make the cleanup ticker spin and every counter expire at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_secs == 0 {
            anyhow::bail!("THROTTLE_WINDOW_SECS must be greater than zero");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("THROTTLE_MAX_ATTEMPTS must be greater than zero");
        }
        Ok(())
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown STORAGE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub throttle: ThrottleConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match std::env::var("STORAGE") {
            Ok(v) => v.parse()?,
            Err(_) => StorageKind::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if storage == StorageKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "receitas".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "receitas-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24),
        };
        let throttle = ThrottleConfig {
            max_attempts: env_or("THROTTLE_MAX_ATTEMPTS", 10),
            window_secs: env_or("THROTTLE_WINDOW_SECS", 60),
        };
        throttle.validate()?;

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            storage,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            db_timeout_secs: env_or("DB_TIMEOUT_SECS", 5),
            jwt,
            throttle,
        })
    }
}
