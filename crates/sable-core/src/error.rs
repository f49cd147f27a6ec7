use std::io;

use thiserror::Error;

use crate::http::{ParseError, StatusCode};

/// Central error type for the sable server.
#[derive(Debug, Error)]
pub enum SableError {
    /// Underlying I/O error from the OS or network.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The listening socket could not be created, bound or put in listen mode.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The raw request bytes could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A requested path does not map to a readable file.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    /// A worker thread could not be spawned.
    #[error("worker spawn failed: {0}")]
    WorkerSpawn(String),
}

impl SableError {
    /// The HTTP status the request handler answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SableError::NotFound(_) => StatusCode::NotFound,
            SableError::Parse(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }
}

pub type SableResult<T> = Result<T, SableError>;
