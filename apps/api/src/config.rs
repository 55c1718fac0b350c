use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` is required; everything else degrades gracefully.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Fallback tier. In-memory store when unset.
    pub redis_url: Option<String>,
    /// Absent in dev/test; AI endpoints then answer with labeled demo content.
    pub anthropic_api_key: Option<String>,
    pub llm_timeout_secs: u64,
    pub default_store_id: Option<String>,
    pub default_stylist_id: Option<String>,
    pub knowledge_category_prefix: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            default_store_id: optional_env("DEFAULT_STORE_ID"),
            default_stylist_id: optional_env("DEFAULT_STYLIST_ID"),
            knowledge_category_prefix: optional_env("KNOWLEDGE_CATEGORY_PREFIX")
                .unwrap_or_else(|| "meteo".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats an empty value the same as an unset one.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    /// Configuration used by handler and pipeline tests.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/counsel_test".to_string(),
            redis_url: None,
            anthropic_api_key: None,
            llm_timeout_secs: 30,
            default_store_id: Some("store-test".to_string()),
            default_stylist_id: Some("stylist-test".to_string()),
            knowledge_category_prefix: "meteo".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
