// src/conn.rs
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::config::{Config, DEFAULT_READ_BUF_SIZE};
use crate::error::SableResult;
use crate::handler::RequestHandler;
use crate::metrics::{ConnectionGuard, ServerMetrics};
use crate::pool::Task;

const LINGER_TIMEOUT: Duration = Duration::from_millis(50);
const LINGER_BUDGET: Duration = Duration::from_millis(250);
const LINGER_LIMIT: usize = 64 * 1024;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnSettings {
    /// Size of the single read; longer requests are truncated.
    pub read_buf_size: usize,
    /// Read and write deadline, `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
}

impl Default for ConnSettings {
    fn default() -> Self {
        Self {
            read_buf_size: DEFAULT_READ_BUF_SIZE,
            io_timeout: None,
        }
    }
}

impl From<&Config> for ConnSettings {
    fn from(config: &Config) -> Self {
        Self {
            read_buf_size: config.read_buf_size,
            io_timeout: config.io_timeout(),
        }
    }
}

/// Exclusive owner of one accepted stream.
///
/// The stream is closed exactly once, when the `Connection` is dropped,
/// whatever path the task took to get there.
pub struct Connection {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    _guard: ConnectionGuard,
}

impl Connection {
    pub fn new(stream: TcpStream, metrics: Arc<ServerMetrics>) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream: Some(stream),
            peer,
            _guard: ConnectionGuard::new(metrics),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Read one request, answer it, and close.
    ///
    /// Returns the number of response bytes written; 0 when the peer sent
    /// nothing.
    pub fn serve(mut self, handler: &RequestHandler, settings: ConnSettings) -> SableResult<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };
        stream.set_read_timeout(settings.io_timeout)?;
        stream.set_write_timeout(settings.io_timeout)?;

        let mut buf = vec![0u8; settings.read_buf_size.max(1)];
        let read = stream.read(&mut buf)?;
        trace!(peer = ?self.peer, bytes = read, "request read");
        if read == 0 {
            debug!(peer = ?self.peer, "peer closed without sending a request");
            return Ok(0);
        }

        let response = handler.handle(&buf[..read]);
        stream.write_all(&response)?;
        stream.flush()?;

        handler.metrics().add_bytes(response.len());
        trace!(peer = ?self.peer, bytes = response.len(), "response written");

        discard_unread(stream, &mut buf, settings.io_timeout);
        Ok(response.len())
    }
}

/// Send FIN, then read and discard what the peer still has in flight.
/// A socket closed with unread input is reset, and the reset can discard
/// the response before the peer reads it.
///
/// The whole drain is bounded by `LINGER_BUDGET` (or the I/O deadline when
/// shorter), so a peer trickling bytes cannot hold the worker.
fn discard_unread(stream: &mut TcpStream, buf: &mut [u8], io_timeout: Option<Duration>) {
    let _ = stream.shutdown(Shutdown::Write);
    let budget = io_timeout.map_or(LINGER_BUDGET, |t| t.min(LINGER_BUDGET));
    let deadline = Instant::now() + budget;
    let mut drained = 0;
    while drained < LINGER_LIMIT {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            trace!(drained, "linger budget spent");
            break;
        }
        if stream
            .set_read_timeout(Some(remaining.min(LINGER_TIMEOUT)))
            .is_err()
        {
            break;
        }
        match stream.read(buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Best effort; the peer may already be gone.
            let _ = stream.shutdown(Shutdown::Both);
            debug!(peer = ?self.peer, "connection closed");
        }
    }
}

/// Wrap an accepted stream into a pool task.
///
/// I/O failures end only this task: they are logged and counted, and the
/// stream is still released.
pub fn into_task(stream: TcpStream, handler: RequestHandler, settings: ConnSettings) -> Task {
    Box::new(move || {
        let metrics = handler.metrics().clone();
        let conn = Connection::new(stream, metrics.clone());
        let peer = conn.peer();
        if let Err(e) = conn.serve(&handler, settings) {
            metrics.inc_failed();
            error!(peer = ?peer, error = %e, "connection task failed");
        }
    })
}
