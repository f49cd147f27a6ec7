//! Logging and tracing initialization for sable.
//!
//! The log level is controlled by the `RUST_LOG` environment variable:
//!
//! ```bash
//! # Per-connection and cache traces
//! RUST_LOG=sable_core=debug sable
//!
//! # Only warnings and errors (production)
//! RUST_LOG=warn sable
//! ```
//!
//! Every initializer uses `try_init`, so calling one twice (as integration
//! tests do) leaves the first subscriber in place instead of panicking.

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Some(LogFormat::Compact),
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize logging with sensible defaults (`info` unless `RUST_LOG` is set).
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG` still takes precedence when present.
pub fn init_logging_with_level(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(default_filter(level))
        .with(tracing_subscriber::fmt::layer().compact().with_thread_names(true))
        .try_init();
}

/// Initialize pretty-formatted logging (recommended for development).
pub fn init_logging_pretty() {
    let _ = tracing_subscriber::registry()
        .with(default_filter("info"))
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(true),
        )
        .try_init();
}

/// Initialize JSON-formatted logging (recommended for production).
pub fn init_logging_json() {
    let _ = tracing_subscriber::registry()
        .with(default_filter("info"))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}

/// Initialize logging in the format named by the configuration.
pub fn init_from_config(config: &Config) {
    match config.log_format {
        LogFormat::Compact => init_logging(),
        LogFormat::Pretty => init_logging_pretty(),
        LogFormat::Json => init_logging_json(),
    }
}
