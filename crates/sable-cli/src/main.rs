use std::process::ExitCode;

use clap::Parser;
use sable_core::{Config, SchedulePolicy, Server, logging};

#[derive(Parser)]
#[command(name = "sable")]
#[command(about = "Multi-threaded static file server with an in-memory LRU cache")]
#[command(version)]
struct Cli {
    /// Address to listen on (overrides SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides SERVER_PORT)
    #[arg(long, short)]
    port: Option<u16>,

    /// Worker threads, 0 for one per core (overrides WORKERS)
    #[arg(long, short)]
    workers: Option<usize>,

    /// Maximum number of cached files (overrides CACHE_CAPACITY)
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Seconds before a cached file is reloaded (overrides CACHE_TTL_SECS)
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Static file root (overrides BASE_DIR)
    #[arg(long)]
    base_dir: Option<std::path::PathBuf>,

    /// Spin idle workers instead of blocking them
    #[arg(long)]
    busy_poll: bool,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(host) = self.host {
            config.server_host = host;
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.cache_capacity.filter(|c| *c > 0) {
            config.cache_capacity = capacity;
        }
        if let Some(ttl) = self.cache_ttl_secs.filter(|t| *t > 0) {
            config.cache_ttl_secs = ttl;
        }
        if let Some(base_dir) = self.base_dir {
            // An upload dir set on its own is kept; a derived one follows the root.
            if config.upload_dir == config.base_dir.join("uploads") {
                config.upload_dir = base_dir.join("uploads");
            }
            config.base_dir = base_dir;
        }
        if self.busy_poll {
            config.schedule = SchedulePolicy::BusyPoll;
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.apply(Config::from_env());
    logging::init_from_config(&config);

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    match server.run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}
