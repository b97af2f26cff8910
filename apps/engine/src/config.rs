use anyhow::{Context, Result};
use uuid::Uuid;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Max records a single batch run considers.
    pub batch_limit: i64,
    /// Optional job restriction for the batch run.
    pub job_id: Option<Uuid>,
    /// Pool size; the sequential batch runner needs only a handful.
    pub db_max_connections: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            batch_limit: std::env::var("BATCH_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse::<i64>()
                .context("BATCH_LIMIT must be a valid integer")?,
            job_id: match std::env::var("JOB_ID") {
                Ok(raw) => Some(raw.parse::<Uuid>().context("JOB_ID must be a valid UUID")?),
                Err(_) => None,
            },
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a valid integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
