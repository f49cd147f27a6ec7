use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{SableError, SableResult};
use crate::http::StatusCode;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Local filesystem access for static files and uploads.
///
/// ```rust,ignore
/// let files = FileStore::new("./files", "./files/uploads");
/// let path = files.resolve("/home.html")?;
/// let bytes = files.load(&path)?;
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
    upload_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            base_dir: base_dir.into(),
            upload_dir: upload_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Map a URL path to an existing file under the base directory.
    ///
    /// The result is canonical, so it doubles as a stable cache key. Paths
    /// that do not exist, are not regular files, or escape the base
    /// directory are reported as `NotFound`.
    pub fn resolve(&self, url_path: &str) -> SableResult<PathBuf> {
        let relative = url_path.trim_start_matches('/');
        let base = self
            .base_dir
            .canonicalize()
            .map_err(|e| SableError::NotFound(format!("{}: {}", self.base_dir.display(), e)))?;
        let candidate = base
            .join(relative)
            .canonicalize()
            .map_err(|e| SableError::NotFound(format!("{}: {}", url_path, e)))?;

        if !candidate.starts_with(&base) || !candidate.is_file() {
            return Err(SableError::NotFound(url_path.to_string()));
        }
        Ok(candidate)
    }

    /// Read a whole file into memory.
    pub fn load(&self, path: &Path) -> SableResult<Vec<u8>> {
        fs::read(path).map_err(|e| SableError::NotFound(format!("{}: {}", path.display(), e)))
    }

    /// Location of the image shown for an error status.
    pub fn status_page_path(&self, status: StatusCode) -> PathBuf {
        self.base_dir
            .join("status")
            .join(format!("{}.jpg", status.as_u16()))
    }

    /// Persist an upload body under a fresh UUID-based name.
    pub fn store_upload(&self, data: &[u8]) -> SableResult<PathBuf> {
        fs::create_dir_all(&self.upload_dir)
            .map_err(|e| SableError::Upload(format!("failed to create upload dir: {}", e)))?;

        let stored = self.upload_dir.join(format!("{}.txt", Uuid::new_v4()));
        fs::write(&stored, data)
            .map_err(|e| SableError::Upload(format!("{}: {}", stored.display(), e)))?;
        debug!(path = %stored.display(), bytes = data.len(), "upload stored");
        Ok(stored)
    }
}

/// MIME type for a path, guessed from its extension.
pub fn mime_type(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
}
