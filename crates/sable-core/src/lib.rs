//! Thread-pool HTTP server core: a fixed worker pool fed by a blocking work
//! queue, and a shared LRU cache with per-entry age for static files.
//!
//! ```text
//! accept ─► Connection ─► Task ─► WorkQueue ─► worker N
//!                                               │ read (one buffer)
//!                                               │ RequestHandler ──► SharedCache (one lock)
//!                                               │ write
//!                                               └ drop Connection (close once)
//! ```

pub mod cache;
pub mod config;
pub mod conn;
pub mod error;
pub mod files;
pub mod handler;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod server;
pub mod shared;

// Re-exports for users
pub use cache::LruTtlCache;
pub use config::Config;
pub use error::{SableError, SableResult};
pub use handler::RequestHandler;
pub use pool::{SchedulePolicy, ThreadPool};
pub use queue::WorkQueue;
pub use server::{Server, ShutdownHandle};
pub use shared::SharedCache;
