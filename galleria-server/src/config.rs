//! Server configuration, loaded from environment variables at startup.
//!
//! AI settings (keys, endpoints, models) are not part of this struct; they
//! are resolved per request by [`crate::ai::SettingsResolver`].

use std::time::Duration;

pub const DEFAULT_MOCK_IMAGE_URL: &str = "https://picsum.photos/seed/galleria/1024/1024";

/// Runtime configuration for galleria-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://galleria.db"`).
    pub database_url: String,

    /// Pool size; an in-memory database always uses one connection.
    pub db_max_connections: u32,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rolling log files; stdout only when unset.
    pub log_dir: Option<String>,

    /// Root directory for materialized assets.
    pub content_dir: String,

    /// URL prefix under which `content_dir` is served.
    pub public_prefix: String,

    /// Generation queue bound.
    pub queue_capacity: usize,

    /// Maximum generation jobs running at once.
    pub worker_concurrency: usize,

    /// Delay before a placeholder result when no API key is configured.
    pub mock_delay: Duration,

    /// Placeholder image used when no API key is configured.
    pub mock_image_url: String,

    /// `PROCESSING` tasks older than this are failed by the sweeper.
    pub stale_task_after: Duration,

    /// Sweeper period; zero disables it.
    pub sweep_interval: Duration,

    /// Comma-separated allowed CORS origins; any origin when unset.
    pub cors_allowed_origins: Option<String>,

    /// Bearer token required by admin routes; open when unset.
    pub admin_token: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("GALLERIA_BIND", "0.0.0.0:3000"),
            database_url: env_or("GALLERIA_DATABASE_URL", "sqlite://galleria.db"),
            db_max_connections: parse_env("GALLERIA_DB_MAX_CONNECTIONS", 8),
            log_level: env_or("GALLERIA_LOG", "info"),
            log_json: bool_env("GALLERIA_LOG_JSON", false),
            log_dir: opt_env("GALLERIA_LOG_DIR"),
            content_dir: env_or("GALLERIA_CONTENT_DIR", "uploads"),
            public_prefix: env_or("GALLERIA_PUBLIC_PREFIX", "/uploads"),
            queue_capacity: parse_env("GALLERIA_QUEUE_CAPACITY", 64),
            worker_concurrency: parse_env("GALLERIA_WORKER_CONCURRENCY", 4),
            mock_delay: Duration::from_millis(parse_env("GALLERIA_MOCK_DELAY_MS", 2000)),
            mock_image_url: env_or("GALLERIA_MOCK_IMAGE_URL", DEFAULT_MOCK_IMAGE_URL),
            stale_task_after: Duration::from_secs(parse_env("GALLERIA_STALE_TASK_SECS", 900)),
            sweep_interval: Duration::from_secs(parse_env("GALLERIA_SWEEP_INTERVAL_SECS", 60)),
            cors_allowed_origins: opt_env("GALLERIA_CORS_ORIGINS"),
            admin_token: opt_env("GALLERIA_ADMIN_TOKEN"),
            enable_docs: bool_env("GALLERIA_ENABLE_DOCS", true),
        }
    }
}

impl Default for Config {
    /// Defaults with an in-memory database and no environment lookups.
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_owned(),
            database_url: "sqlite::memory:".to_owned(),
            db_max_connections: 1,
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            content_dir: "uploads".to_owned(),
            public_prefix: "/uploads".to_owned(),
            queue_capacity: 64,
            worker_concurrency: 4,
            mock_delay: Duration::from_millis(2000),
            mock_image_url: DEFAULT_MOCK_IMAGE_URL.to_owned(),
            stale_task_after: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(60),
            cors_allowed_origins: None,
            admin_token: None,
            enable_docs: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
