use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::logging::LogFormat;
use crate::pool::SchedulePolicy;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_READ_BUF_SIZE: usize = 1024;
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5000;

/// Server configuration loaded from environment variables.
///
/// Every field has a default; values that fail to parse or are out of range
/// fall back to that default instead of failing startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 8080)
    pub server_port: u16,

    /// Worker thread count (default: host parallelism)
    pub workers: usize,

    /// How idle workers wait for tasks (default: blocking wait)
    pub schedule: SchedulePolicy,

    /// Pin worker N to CPU core N (default: false)
    pub pin_workers: bool,

    /// Maximum number of cached files (default: 10)
    pub cache_capacity: usize,

    /// Age after which a cached file is reloaded from disk, in seconds (default: 60)
    pub cache_ttl_secs: u64,

    /// Bytes read from each connection; larger requests are truncated (default: 1024)
    pub read_buf_size: usize,

    /// Read/write deadline per connection in milliseconds, 0 disables it (default: 5000)
    pub io_timeout_ms: u64,

    /// Root directory for static files (default: ./files)
    pub base_dir: PathBuf,

    /// Directory receiving POST /upload bodies (default: ./files/uploads)
    pub upload_dir: PathBuf,

    /// Log output format (default: compact)
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Self {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let positive_usize = |key: &str, default: usize| {
            parsed(key)
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(default)
        };

        let base_dir = parsed("BASE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./files"));

        let upload_dir = parsed("UPLOAD_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("uploads"));

        Config {
            server_host: parsed("SERVER_HOST")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parsed("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            workers: positive_usize("WORKERS", num_cpus::get().max(1)),
            schedule: parsed("SCHEDULE")
                .and_then(|v| SchedulePolicy::parse(&v))
                .unwrap_or_default(),
            pin_workers: matches!(
                parsed("PIN_WORKERS")
                    .unwrap_or_default()
                    .to_lowercase()
                    .as_str(),
                "true" | "1" | "yes"
            ),
            cache_capacity: positive_usize("CACHE_CAPACITY", DEFAULT_CAPACITY),
            cache_ttl_secs: parsed("CACHE_TTL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_TTL.as_secs()),
            read_buf_size: positive_usize("READ_BUF_SIZE", DEFAULT_READ_BUF_SIZE),
            io_timeout_ms: parsed("IO_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_IO_TIMEOUT_MS),
            base_dir,
            upload_dir,
            log_format: parsed("LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The per-connection I/O deadline, `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}
