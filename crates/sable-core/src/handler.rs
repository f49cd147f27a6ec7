// src/handler.rs
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::Payload;
use crate::error::SableResult;
use crate::files::{FileStore, mime_type};
use crate::http::{Method, Request, ResponseBuilder, StatusCode, parse_request};
use crate::metrics::ServerMetrics;
use crate::shared::SharedCache;

pub const INDEX_PATH: &str = "/home.html";

/// Turns one raw request into one serialized response.
///
/// Static files go through the shared cache: a fresh hit is served from
/// memory, a miss or stale entry is read from disk outside the cache lock
/// and then inserted.
#[derive(Clone)]
pub struct RequestHandler {
    cache: SharedCache,
    files: FileStore,
    metrics: Arc<ServerMetrics>,
}

impl RequestHandler {
    pub fn new(cache: SharedCache, files: FileStore, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            cache,
            files,
            metrics,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Never fails: every problem becomes an error response.
    pub fn handle(&self, raw: &[u8]) -> Vec<u8> {
        self.metrics.inc_req();

        let request = match parse_request(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "malformed request");
                return self.status_page(StatusCode::BadRequest).build();
            }
        };
        debug!(
            method = %request.method_token,
            path = %request.path,
            headers = request.headers.len(),
            body = request.body.len(),
            "request parsed"
        );

        let response = match (request.method, request.path.as_str()) {
            (Method::Get, path) if path.starts_with("/echo") => echo(&request),
            (Method::Get, _) => self.serve_static(&request),
            (Method::Post, "/upload") => self.upload(&request),
            _ => {
                warn!(method = %request.method_token, path = %request.path, "unsupported request");
                self.status_page(StatusCode::BadRequest)
            }
        };

        info!(
            method = %request.method_token,
            path = %request.path,
            status = response.status_code().as_u16(),
            "request handled"
        );
        response.build()
    }

    fn serve_static(&self, request: &Request) -> ResponseBuilder {
        let url_path = if request.path == "/" {
            INDEX_PATH
        } else {
            request.path.as_str()
        };

        let served = self
            .files
            .resolve(url_path)
            .and_then(|path| self.cached_file(&path).map(|body| (path, body)));

        match served {
            Ok((path, body)) => ResponseBuilder::new(StatusCode::Ok)
                .content_type(mime_type(&path))
                .body(body.to_vec()),
            Err(e) => {
                warn!(path = %url_path, error = %e, "static file unavailable");
                self.status_page(e.status_code())
            }
        }
    }

    /// Fetch a file through the cache. The lock is held only for the
    /// individual cache calls, never for the disk read.
    fn cached_file(&self, path: &Path) -> SableResult<Payload> {
        let key = path.to_string_lossy();

        if let Some(payload) = self.cache.get_or_delete_expired(&key) {
            self.metrics.inc_hit();
            debug!(key = %key, bytes = payload.len(), "cache hit");
            return Ok(payload);
        }

        self.metrics.inc_miss();
        let payload = Payload::from(self.files.load(path)?);
        self.cache.put(&key, payload.clone());
        debug!(key = %key, bytes = payload.len(), "cache miss, loaded from disk");
        Ok(payload)
    }

    fn upload(&self, request: &Request) -> ResponseBuilder {
        match self.files.store_upload(&request.body) {
            Ok(stored) => {
                let name = stored
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ResponseBuilder::new(StatusCode::Created)
                    .content_type("text/plain")
                    .body(format!("Stored {}\r\n", name))
            }
            Err(e) => {
                warn!(error = %e, "upload failed");
                self.status_page(e.status_code())
            }
        }
    }

    /// Error response carrying `status/<code>.jpg` when present, otherwise
    /// the reason phrase as plain text. Read straight from disk so the cache
    /// counters only reflect static files.
    fn status_page(&self, status: StatusCode) -> ResponseBuilder {
        let image = self.files.status_page_path(status);
        if image.is_file() {
            match self.files.load(&image) {
                Ok(body) => {
                    return ResponseBuilder::new(status)
                        .content_type(mime_type(&image))
                        .body(body);
                }
                Err(e) => debug!(error = %e, "status image unreadable"),
            }
        }
        ResponseBuilder::new(status)
            .content_type("text/plain")
            .body(status.reason())
    }
}

fn echo(request: &Request) -> ResponseBuilder {
    let mut body = String::from("Echoing request details:\r\n");
    body.push_str(&format!("Method: {}\r\n", request.method_token));
    body.push_str(&format!("Path: {}\r\n", request.path));
    body.push_str(&format!("Version: {}\r\n", request.version));
    body.push_str("Headers:\r\n");
    for (name, value) in &request.headers {
        body.push_str(&format!("- {}: {}\r\n", name, value));
    }
    body.push_str("Body:\r\n");
    body.push_str(&String::from_utf8_lossy(&request.body));
    body.push_str("\r\n");

    ResponseBuilder::new(StatusCode::Ok)
        .content_type("text/plain")
        .body(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn handler_in(dir: &Path) -> RequestHandler {
        RequestHandler::new(
            SharedCache::new(4, Duration::from_secs(60)),
            FileStore::new(dir, dir.join("uploads")),
            Arc::new(ServerMetrics::new()),
        )
    }

    fn text(raw: Vec<u8>) -> String {
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[test]
    fn test_root_serves_home_and_caches_it() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("home.html"), b"<h1>home</h1>").unwrap();
        let handler = handler_in(dir.path());

        let first = text(handler.handle(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(first.starts_with("HTTP/1.1 200 OK"));
        assert!(first.contains("Content-Type: text/html"));
        assert!(first.ends_with("<h1>home</h1>"));
        assert_eq!(handler.cache().len(), 1);

        // Served from memory even after the file disappears.
        fs::remove_file(dir.path().join("home.html")).unwrap();
        fs::write(dir.path().join("home.html"), b"changed").unwrap();
        let second = text(handler.handle(b"GET /home.html HTTP/1.1\r\n\r\n"));
        assert!(second.ends_with("<h1>home</h1>"));

        let snap = handler.metrics().snapshot();
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.requests, 2);
    }

    #[test]
    fn test_missing_file_is_404_text() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path());
        let resp = text(handler.handle(b"GET /nope.html HTTP/1.1\r\n\r\n"));
        assert!(resp.starts_with("HTTP/1.1 404 Not Found"));
        assert!(resp.ends_with("Not Found"));
    }

    #[test]
    fn test_status_image_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("status")).unwrap();
        fs::write(dir.path().join("status/400.jpg"), b"JPEGDATA").unwrap();
        let handler = handler_in(dir.path());

        let resp = text(handler.handle(b"DELETE /x HTTP/1.1\r\n\r\n"));
        assert!(resp.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(resp.contains("Content-Type: image/jpeg"));
        assert!(resp.ends_with("JPEGDATA"));
    }

    #[test]
    fn test_status_pages_leave_cache_counters_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("status")).unwrap();
        fs::write(dir.path().join("status/404.jpg"), b"JPEG404").unwrap();
        fs::write(dir.path().join("status/400.jpg"), b"JPEG400").unwrap();
        let handler = handler_in(dir.path());

        for _ in 0..3 {
            let resp = text(handler.handle(b"GET /missing.html HTTP/1.1\r\n\r\n"));
            assert!(resp.ends_with("JPEG404"));
        }
        let resp = text(handler.handle(b"PUT /x HTTP/1.1\r\n\r\n"));
        assert!(resp.ends_with("JPEG400"));

        let snap = handler.metrics().snapshot();
        assert_eq!(snap.cache_hits, 0);
        assert_eq!(snap.cache_misses, 0);
        assert!(handler.cache().is_empty());
        assert_eq!(snap.requests, 4);
    }

    #[test]
    fn test_echo() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path());
        let resp = text(handler.handle(b"GET /echo HTTP/1.1\r\nHost: here\r\n\r\nhi"));
        assert!(resp.starts_with("HTTP/1.1 200 OK"));
        assert!(resp.contains("Method: GET\r\n"));
        assert!(resp.contains("Path: /echo\r\n"));
        assert!(resp.contains("- Host: here\r\n"));
        assert!(resp.contains("Body:\r\nhi\r\n"));
    }

    #[test]
    fn test_upload_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path());
        let resp = text(handler.handle(b"POST /upload HTTP/1.1\r\n\r\nfile body"));
        assert!(resp.starts_with("HTTP/1.1 201 Created"));

        let entries: Vec<_> = fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(fs::read(&entries[0]).unwrap(), b"file body");
    }

    #[test]
    fn test_garbage_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path());
        let resp = text(handler.handle(b"\r\n"));
        assert!(resp.starts_with("HTTP/1.1 400 Bad Request"));
    }
}
