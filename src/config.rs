use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Deployment flavour. Only non-production builds tell the client which
/// half of a credential pair was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" => Ok(Self::Development),
            other => anyhow::bail!("unknown APP_ENV {other:?}"),
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockoutStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
    pub store: LockoutStoreKind,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window_secs: 300,
            store: LockoutStoreKind::Postgres,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub environment: Environment,
    pub lockout: LockoutConfig,
    pub allow_admin_signup: bool,
    pub import_users_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))?;
        Ok(addr)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "platform-auth".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "intelligence-platform".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let environment = match std::env::var("APP_ENV") {
            Ok(raw) => Environment::parse(&raw)?,
            Err(_) => Environment::Production,
        };

        let defaults = LockoutConfig::default();
        let store = match std::env::var("LOCKOUT_STORE").as_deref() {
            Ok("memory") => LockoutStoreKind::Memory,
            Ok("postgres") | Err(_) => LockoutStoreKind::Postgres,
            Ok(other) => anyhow::bail!("unknown LOCKOUT_STORE {other:?}"),
        };
        let lockout = LockoutConfig {
            max_attempts: env_parse("LOCKOUT_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            window_secs: env_parse("LOCKOUT_WINDOW_SECS").unwrap_or(defaults.window_secs),
            store,
        };
        anyhow::ensure!(lockout.max_attempts > 0, "LOCKOUT_MAX_ATTEMPTS must be positive");
        anyhow::ensure!(lockout.window_secs > 0, "LOCKOUT_WINDOW_SECS must be positive");

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
            database_url,
            jwt,
            environment,
            lockout,
            allow_admin_signup: env_parse("ALLOW_ADMIN_SIGNUP").unwrap_or(false),
            import_users_file: std::env::var("IMPORT_USERS_FILE").ok().map(PathBuf::from),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
