use std::time::Duration;

use pictor_core::retry::RetryConfig;
use pictor_pipeline::GenerationConfig;
use pictor_registry::RetentionConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Maximum number of jobs waiting behind the execution slot.
    pub queue_capacity: usize,
    /// Per-job wall-clock ceiling in seconds.
    pub job_timeout_secs: u64,
    /// How long terminal jobs remain pollable, in hours.
    pub retention_ttl_hours: i64,
    /// How often the retention sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `QUEUE_CAPACITY`       | `50`                       |
    /// | `JOB_TIMEOUT_SECS`     | `300`                      |
    /// | `RETENTION_TTL_HOURS`  | `24`                       |
    /// | `SWEEP_INTERVAL_SECS`  | `600`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parsed("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parsed("REQUEST_TIMEOUT_SECS", 30),
            queue_capacity: env_parsed("QUEUE_CAPACITY", 50),
            job_timeout_secs: env_parsed("JOB_TIMEOUT_SECS", 300),
            retention_ttl_hours: env_parsed("RETENTION_TTL_HOURS", 24),
            sweep_interval_secs: env_parsed("SWEEP_INTERVAL_SECS", 600),
        }
    }

    /// Pipeline tunables derived from this configuration.
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            queue_capacity: self.queue_capacity,
            retry: RetryConfig::default(),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    /// Retention tunables derived from this configuration.
    pub fn retention(&self) -> RetentionConfig {
        RetentionConfig {
            ttl: chrono::Duration::hours(self.retention_ttl_hours),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

/// Upstream endpoints and credentials for the real capability adapters.
///
/// When `design_api_key` is absent the binary falls back to the offline
/// in-memory adapters, which keeps local development credential-free.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub design_api_url: String,
    pub design_api_key: Option<String>,
    pub render_api_url: String,
    pub render_api_key: String,
    pub oss_endpoint: String,
    pub oss_prefix: String,
    pub oss_token: String,
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        Self {
            design_api_url: std::env::var("DESIGN_API_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".into()
            }),
            design_api_key: std::env::var("DESIGN_API_KEY").ok(),
            render_api_url: std::env::var("RENDER_API_URL")
                .unwrap_or_else(|_| "https://api.render.example.com/v1".into()),
            render_api_key: std::env::var("RENDER_API_KEY").unwrap_or_default(),
            oss_endpoint: std::env::var("OSS_ENDPOINT")
                .unwrap_or_else(|_| "https://pictor-images.oss.example.com".into()),
            oss_prefix: std::env::var("OSS_PREFIX").unwrap_or_else(|_| "images".into()),
            oss_token: std::env::var("OSS_TOKEN").unwrap_or_default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e:?}")),
        Err(_) => default,
    }
}
