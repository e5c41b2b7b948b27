// Server configuration
//
// Read once at startup from the environment (after `.env` is loaded).

use std::str::FromStr;
use std::time::Duration;

/// Error for malformed configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// OpenAI-compatible endpoint for `ai_generate`
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Full chat completions URL
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL URL; absent means in-memory dev mode
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// How often the wait scheduler looks for elapsed waits
    pub wait_poll_interval: Duration,
    /// Maximum executions resumed per poll
    pub wait_poll_batch: usize,
    /// Unit for exponential retry backoff
    pub retry_base_unit: Duration,
    /// Origins allowed by CORS; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
    pub openai: Option<OpenAiConfig>,
}

pub const DEFAULT_PORT: u16 = 9300;
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATABASE_URL`: PostgreSQL URL (unset = in-memory store)
    /// - `HOST` / `PORT`: bind address (default `0.0.0.0:9300`)
    /// - `WAIT_POLL_INTERVAL_SECS`: wait scheduler interval (default 30)
    /// - `WAIT_POLL_BATCH`: executions resumed per poll (default 50)
    /// - `RETRY_BASE_UNIT_MS`: retry backoff unit (default 1000)
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated origins
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`: content generation
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openai = var("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            api_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        Ok(Self {
            database_url: var("DATABASE_URL"),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse("PORT", var("PORT"), DEFAULT_PORT)?,
            wait_poll_interval: Duration::from_secs(parse(
                "WAIT_POLL_INTERVAL_SECS",
                var("WAIT_POLL_INTERVAL_SECS"),
                30,
            )?),
            wait_poll_batch: parse("WAIT_POLL_BATCH", var("WAIT_POLL_BATCH"), 50)?,
            retry_base_unit: Duration::from_millis(parse(
                "RETRY_BASE_UNIT_MS",
                var("RETRY_BASE_UNIT_MS"),
                1000,
            )?),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            openai,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
