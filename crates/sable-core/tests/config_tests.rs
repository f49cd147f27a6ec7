use sable_core::config::Config;
use sable_core::logging::LogFormat;
use sable_core::pool::SchedulePolicy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_config_defaults() {
    let config = Config::from_lookup(lookup(&[]));

    assert_eq!(config.server_host, "127.0.0.1");
    assert_eq!(config.server_port, 8080);
    assert!(config.workers >= 1, "defaults to host parallelism");
    assert_eq!(config.schedule, SchedulePolicy::BlockingWait);
    assert!(!config.pin_workers);
    assert_eq!(config.cache_capacity, 10);
    assert_eq!(config.cache_ttl(), Duration::from_secs(60));
    assert_eq!(config.read_buf_size, 1024);
    assert_eq!(config.base_dir, PathBuf::from("./files"));
    assert_eq!(config.upload_dir, PathBuf::from("./files/uploads"));
    assert_eq!(config.log_format, LogFormat::Compact);
    assert_eq!(config.server_addr(), "127.0.0.1:8080");
}

#[test]
fn test_config_overrides() {
    let config = Config::from_lookup(lookup(&[
        ("SERVER_HOST", "0.0.0.0"),
        ("SERVER_PORT", "9000"),
        ("WORKERS", "3"),
        ("SCHEDULE", "busy-poll"),
        ("PIN_WORKERS", "yes"),
        ("CACHE_CAPACITY", "32"),
        ("CACHE_TTL_SECS", "5"),
        ("READ_BUF_SIZE", "4096"),
        ("IO_TIMEOUT_MS", "250"),
        ("BASE_DIR", "/srv/www"),
        ("UPLOAD_DIR", "/var/uploads"),
        ("LOG_FORMAT", "json"),
    ]));

    assert_eq!(config.server_addr(), "0.0.0.0:9000");
    assert_eq!(config.workers, 3);
    assert_eq!(config.schedule, SchedulePolicy::BusyPoll);
    assert!(config.pin_workers);
    assert_eq!(config.cache_capacity, 32);
    assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    assert_eq!(config.read_buf_size, 4096);
    assert_eq!(config.io_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(config.base_dir, PathBuf::from("/srv/www"));
    assert_eq!(config.upload_dir, PathBuf::from("/var/uploads"));
    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
fn test_invalid_values_fall_back() {
    let config = Config::from_lookup(lookup(&[
        ("SERVER_PORT", "not-a-port"),
        ("WORKERS", "-1"),
        ("SCHEDULE", "whenever"),
        ("CACHE_CAPACITY", "-7"),
        ("CACHE_TTL_SECS", "0"),
        ("READ_BUF_SIZE", "0"),
        ("LOG_FORMAT", "xml"),
    ]));

    assert_eq!(config.server_port, 8080);
    assert!(config.workers >= 1);
    assert_eq!(config.schedule, SchedulePolicy::BlockingWait);
    assert_eq!(config.cache_capacity, 10);
    assert_eq!(config.cache_ttl_secs, 60);
    assert_eq!(config.read_buf_size, 1024);
    assert_eq!(config.log_format, LogFormat::Compact);
}
