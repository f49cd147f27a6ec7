// src/server.rs
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conn::{ConnSettings, into_task};
use crate::error::{SableError, SableResult};
use crate::files::FileStore;
use crate::handler::RequestHandler;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::pool::{PoolOptions, ThreadPool};
use crate::shared::SharedCache;

const ACCEPT_POLL: Duration = Duration::from_millis(25);
const LISTEN_BACKLOG: i32 = 128;

/// Cloneable stop switch for a running [`Server`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Accept loop feeding a [`ThreadPool`].
///
/// ```rust,ignore
/// let server = Server::bind(Config::from_env())?;
/// println!("listening on {}", server.local_addr()?);
/// server.run()?;
/// ```
pub struct Server {
    config: Config,
    listener: TcpListener,
    handler: RequestHandler,
    metrics: Arc<ServerMetrics>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create the listening socket and the shared state.
    ///
    /// Failing to resolve, bind or listen is fatal and reported as
    /// [`SableError::Bind`].
    pub fn bind(config: Config) -> SableResult<Self> {
        let addr_str = config.server_addr();
        let bind_err = |source: io::Error| SableError::Bind {
            addr: addr_str.clone(),
            source,
        };

        let addr = addr_str
            .to_socket_addrs()
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                ))
            })?;
        let listener = listen(addr).map_err(bind_err)?;

        let metrics = Arc::new(ServerMetrics::new());
        let cache = SharedCache::new(config.cache_capacity, config.cache_ttl());
        let files = FileStore::new(&config.base_dir, &config.upload_dir);
        let handler = RequestHandler::new(cache, files, metrics.clone());

        info!(
            addr = %listener.local_addr()?,
            cache_capacity = config.cache_capacity,
            cache_ttl_secs = config.cache_ttl_secs,
            base_dir = %config.base_dir.display(),
            "server bound"
        );

        Ok(Self {
            config,
            listener,
            handler,
            metrics,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> SableResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    pub fn cache(&self) -> SharedCache {
        self.handler.cache().clone()
    }

    /// Serve until Ctrl-C.
    pub fn run(self) -> SableResult<MetricsSnapshot> {
        let shutdown = self.shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("received SIGINT, initiating graceful shutdown");
            shutdown.trigger();
        }) {
            warn!(error = %e, "could not install Ctrl-C handler");
        }
        self.serve()
    }

    /// Serve until the [`ShutdownHandle`] is triggered, then stop the pool
    /// and wait for every worker.
    pub fn serve(self) -> SableResult<MetricsSnapshot> {
        let pool = ThreadPool::with_options(PoolOptions {
            size: self.config.workers,
            policy: self.config.schedule,
            pin_workers: self.config.pin_workers,
        })?;
        let settings = ConnSettings::from(&self.config);

        info!(
            addr = %self.listener.local_addr()?,
            workers = pool.size(),
            "accepting connections"
        );

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!(peer = %peer, error = %e, "dropping connection");
                        continue;
                    }
                    debug!(peer = %peer, "connection accepted");
                    pool.submit(into_task(stream, self.handler.clone(), settings));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        info!(pending = pool.pending(), "shutting down");
        pool.shutdown();

        let snapshot = self.metrics.snapshot();
        info!(
            requests = snapshot.requests,
            bytes_sent = snapshot.bytes_sent,
            cache_hits = snapshot.cache_hits,
            cache_misses = snapshot.cache_misses,
            failed_tasks = snapshot.failed_tasks,
            "server shut down"
        );
        Ok(snapshot)
    }
}

fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        if addr.is_ipv4() {
            socket2::Domain::IPV4
        } else {
            socket2::Domain::IPV6
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
