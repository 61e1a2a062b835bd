//! Environment-driven configuration for the two deployables.

use std::time::Duration;

/// Configuration for the API server process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address; a bare `:port` binds all interfaces.
    pub server_addr: String,
    pub database_url: String,
    pub redis_addr: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: ":8080".to_string(),
            database_url: "postgres://localhost/streamlation".to_string(),
            redis_addr: "127.0.0.1:6379".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported env vars: `APP_SERVER_ADDR`, `APP_DATABASE_URL`,
    /// `APP_REDIS_ADDR`, `APP_LOG_LEVEL`.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Some(addr) = non_empty_env("APP_SERVER_ADDR") {
            config.server_addr = addr;
        }
        if let Some(url) = non_empty_env("APP_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(addr) = non_empty_env("APP_REDIS_ADDR") {
            config.redis_addr = addr;
        }
        config.log_level = log_level_env("APP_LOG_LEVEL");
        config
    }

    /// The address to bind, with the `:port` shorthand expanded.
    pub fn bind_addr(&self) -> String {
        normalize_bind_addr(&self.server_addr)
    }
}

/// Configuration for the worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_addr: String,
    /// Long-poll bound for queue dequeues.
    pub poll_interval: Duration,
    /// Maximum pipelines in flight.
    pub max_concurrency: usize,
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/streamlation".to_string(),
            redis_addr: "127.0.0.1:6379".to_string(),
            poll_interval: Duration::from_secs(5),
            max_concurrency: 4,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported env vars: `WORKER_DATABASE_URL`, `WORKER_REDIS_ADDR`,
    /// `WORKER_POLL_INTERVAL` (duration, e.g. `5s`, `750ms`; invalid or
    /// non-positive values fall back), `WORKER_MAX_CONCURRENCY` (positive
    /// integer), `WORKER_LOG_LEVEL`.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty_env("WORKER_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(addr) = non_empty_env("WORKER_REDIS_ADDR") {
            config.redis_addr = addr;
        }
        if let Some(raw) = non_empty_env("WORKER_POLL_INTERVAL") {
            match parse_duration(&raw) {
                Some(interval) if !interval.is_zero() => config.poll_interval = interval,
                _ => tracing::warn!(
                    value = raw,
                    "Invalid WORKER_POLL_INTERVAL, using default"
                ),
            }
        }
        if let Some(raw) = non_empty_env("WORKER_MAX_CONCURRENCY") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.max_concurrency = n,
                _ => tracing::warn!(
                    value = raw,
                    "Invalid WORKER_MAX_CONCURRENCY, using default"
                ),
            }
        }
        config.log_level = log_level_env("WORKER_LOG_LEVEL");
        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn log_level_env(key: &str) -> String {
    match non_empty_env(key) {
        Some(level) if matches!(level.as_str(), "debug" | "info" | "warn" | "error") => level,
        Some(level) => {
            tracing::warn!(value = level, "Unknown log level, using 'info'");
            "info".to_string()
        }
        None => "info".to_string(),
    }
}

/// Expand the `:8080` shorthand into a bindable socket address.
pub fn normalize_bind_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

/// Parse a duration of the form `750ms`, `5s`, `2m`, or a bare integer
/// number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(m) = raw.strip_suffix('m') {
        return m.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    if let Some(s) = raw.strip_suffix('s') {
        return s.trim().parse::<u64>().ok().map(Duration::from_secs);
    }
    raw.parse::<u64>().ok().map(Duration::from_secs)
}

/// Turn a host:port or URL-form Redis address into a connection URL.
pub fn redis_url(addr: &str) -> String {
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    }
}
