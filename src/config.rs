use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,

    // Requests per minute per peer IP on the API scope, 0 turns the limiter off
    pub rate_limit_per_min: u32,

    pub api_prefix: String,

    // Browser origins allowed to call the API, `*` allows any
    pub cors_allowed_origins: Vec<String>,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server_addr: var("SERVER_ADDR", "127.0.0.1:8000"),
            database_url: var("DATABASE_URL", "sqlite://attendance.db"),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", "5")?,

            rate_limit_per_min: parse(&lookup, "RATE_LIMIT_PER_MIN", "1000")?,

            api_prefix: var("API_PREFIX", "/api"),

            cors_allowed_origins: var(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:5173,http://127.0.0.1:5173",
            )
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect(),

            log_dir: var("LOG_DIR", "logs"),
            log_level: parse(&lookup, "LOG_LEVEL", "info")?,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{key} has an invalid value: {raw:?}"))
}
