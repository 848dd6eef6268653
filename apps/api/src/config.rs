use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_LOCAL_STORE_DIR: &str = "./data/local";

/// Application configuration loaded from environment variables.
/// Nothing is required: without `DATABASE_URL` the service runs local-only,
/// and without `REFLECTION_ENDPOINT` every reflection is the fallback one.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub reflection_endpoint: Option<String>,
    pub local_store_dir: PathBuf,
    pub realtime_enabled: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            reflection_endpoint: optional_env("REFLECTION_ENDPOINT"),
            local_store_dir: optional_env("LOCAL_STORE_DIR")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORE_DIR.to_string())
                .into(),
            realtime_enabled: match optional_env("REALTIME_ENABLED") {
                Some(raw) => parse_bool(&raw)
                    .with_context(|| format!("REALTIME_ENABLED must be true or false, got '{raw}'"))?,
                None => true,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Unset and blank variables both read as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
