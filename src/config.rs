use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::gemini::{DEFAULT_MODEL, GEMINI_API_BASE};

/// Process-wide configuration, built once at startup and handed to whoever needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub queue: QueueConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

// Keep the key out of startup logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in `x-api-key`. `None` disables the check.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Limits for the generation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub window: Duration,
    pub max_per_window: usize,
    pub job_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            window: Duration::from_millis(60_000),
            max_per_window: 3,
            job_timeout: Duration::from_millis(180_000),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(name) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = QueueConfig::default();
        let mut allowed_origins = vec![
            "http://localhost:5173".to_string(),
            "http://localhost:5174".to_string(),
        ];
        if let Some(extra) = non_empty("ALLOWED_ORIGINS") {
            allowed_origins.extend(
                extra
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            );
        }

        Ok(Self {
            server: ServerConfig {
                port: parsed("PORT", 5000)?,
                host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                environment: non_empty("APP_ENV").unwrap_or_else(|| "production".to_string()),
                allowed_origins,
                upload_dir: non_empty("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("uploads")),
                log_dir: non_empty("LOG_DIR").map(PathBuf::from),
            },
            llm: LlmConfig {
                api_key: non_empty("GEMINI_API_KEY"),
                model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: non_empty("GEMINI_BASE_URL")
                    .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
                temperature: parsed("GEMINI_TEMPERATURE", 0.5)?,
            },
            auth: AuthConfig {
                api_key: non_empty("FRONTEND_API_KEY"),
            },
            queue: QueueConfig {
                max_concurrent: parsed("QUEUE_MAX_CONCURRENT", defaults.max_concurrent)?.max(1),
                window: Duration::from_millis(parsed(
                    "QUEUE_WINDOW_MS",
                    defaults.window.as_millis() as u64,
                )?),
                max_per_window: parsed("QUEUE_MAX_PER_WINDOW", defaults.max_per_window)?.max(1),
                job_timeout: Duration::from_millis(parsed(
                    "QUEUE_JOB_TIMEOUT_MS",
                    defaults.job_timeout.as_millis() as u64,
                )?),
                max_attempts: parsed("QUEUE_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
                initial_backoff: defaults.initial_backoff,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: parsed("ANALYZE_REQUESTS_PER_MINUTE", 30u32)?.max(1),
            },
        })
    }

    /// Configuration for tests and embedding: defaults, no secrets.
    pub fn for_testing(upload_dir: PathBuf) -> Self {
        Self {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                environment: "test".to_string(),
                allowed_origins: vec!["http://localhost:5173".to_string()],
                upload_dir,
                log_dir: None,
            },
            llm: LlmConfig {
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
                base_url: GEMINI_API_BASE.to_string(),
                temperature: 0.5,
            },
            auth: AuthConfig { api_key: None },
            queue: QueueConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
