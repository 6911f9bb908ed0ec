use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Client configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub reveal_tick: Duration,
    pub reveal_chars_per_tick: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let reveal_chars_per_tick = parse_env("REVEAL_CHARS_PER_TICK", 3_usize)?;
        if reveal_chars_per_tick == 0 {
            bail!("REVEAL_CHARS_PER_TICK must be at least 1");
        }

        Ok(Config {
            api_url: require_env("API_URL")?.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 120_u64)?),
            reveal_tick: Duration::from_millis(parse_env("REVEAL_TICK_MS", 20_u64)?),
            reveal_chars_per_tick,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
