// src/http.rs
use std::time::SystemTime;

use thiserror::Error;

pub const SERVER_NAME: &str = "sable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get, Post, Put, Delete, Patch, Head, Options, Trace, Connect, Unknown,
}

impl Method {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"PATCH" => Method::Patch,
            b"HEAD" => Method::Head,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            b"CONNECT" => Method::Connect,
            _ => Method::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("incomplete request line")]
    Incomplete,
    #[error("invalid request format")]
    InvalidFormat,
}

/// A parsed request. Owns its data so it can outlive the read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Raw method token, kept for echoing unknown methods.
    pub method_token: String,
    pub path: String,
    pub query: Option<String>,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Split off the next line, accepting both CRLF and bare LF endings.
/// Returns the line without its terminator and the rest of the buffer.
fn next_line(buf: &[u8]) -> (&[u8], Option<&[u8]>) {
    match buf.iter().position(|&b| b == b'\n') {
        Some(nl) => {
            let line = &buf[..nl];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (line, Some(&buf[nl + 1..]))
        }
        None => (buf.strip_suffix(b"\r").unwrap_or(buf), None),
    }
}

/// Parses a request out of the given buffer.
///
/// The request line is `METHOD PATH [VERSION]`, followed by `Name: value`
/// header lines up to an empty line; whatever follows is the body. A buffer
/// cut short inside the headers yields the headers seen so far and an empty
/// body.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    let start = buf
        .iter()
        .position(|b| !b.is_ascii_whitespace() && *b != 0)
        .ok_or(ParseError::Empty)?;

    let (line, mut rest) = next_line(&buf[start..]);
    let mut tokens = line
        .split(|b| *b == b' ' || *b == b'\t')
        .filter(|t| !t.is_empty());

    let method_bytes = tokens.next().ok_or(ParseError::Incomplete)?;
    let path_bytes = tokens.next().ok_or(ParseError::Incomplete)?;
    let version_bytes = tokens.next().unwrap_or(&b"HTTP/1.1"[..]);

    let method_token = std::str::from_utf8(method_bytes)
        .map_err(|_| ParseError::InvalidFormat)?
        .to_string();
    let full_path = std::str::from_utf8(path_bytes).map_err(|_| ParseError::InvalidFormat)?;
    if !full_path.starts_with('/') {
        return Err(ParseError::InvalidFormat);
    }
    let version = std::str::from_utf8(version_bytes)
        .map_err(|_| ParseError::InvalidFormat)?
        .to_string();

    let (path, query) = match full_path.find('?') {
        Some(idx) => (&full_path[..idx], Some(full_path[idx + 1..].to_string())),
        None => (full_path, None),
    };

    let mut headers = Vec::new();
    let mut body = Vec::new();

    while let Some(remaining) = rest {
        let (line, after) = next_line(remaining);
        rest = after;

        if line.is_empty() {
            if let Some(b) = rest {
                body = b.to_vec();
            }
            break;
        }

        // Lines without a colon are ignored.
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = std::str::from_utf8(&line[..colon]).map_err(|_| ParseError::InvalidFormat)?;
        let value =
            std::str::from_utf8(&line[colon + 1..]).map_err(|_| ParseError::InvalidFormat)?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Request {
        method: Method::from_bytes(method_bytes),
        method_token,
        path: path.to_string(),
        query,
        version,
        headers,
        body,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    NotFound = 404,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Builds a serialized HTTP/1.1 response.
///
/// `Content-Length`, `Date` and `Server` are filled in by [`build`](Self::build)
/// unless set explicitly. Headers keep insertion order; setting a header
/// twice replaces the earlier value.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match self
            .headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(i) => self.headers[i].1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn content_type(self, value: &str) -> Self {
        self.header("Content-Type", value)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason()).as_bytes(),
        );

        let has = |name: &str| self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name));
        let mut headers = self.headers.clone();
        if !has("Content-Length") {
            headers.push(("Content-Length".to_string(), self.body.len().to_string()));
        }
        if !has("Date") {
            headers.push(("Date".to_string(), httpdate::fmt_http_date(SystemTime::now())));
        }
        if !has("Server") {
            headers.push(("Server".to_string(), SERVER_NAME.to_string()));
        }
        headers.push(("Connection".to_string(), "close".to_string()));

        for (name, value) in &headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}
