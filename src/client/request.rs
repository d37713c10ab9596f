// Request and response values passed through the client
//
// Requests are plain data rather than reqwest builders so a request that
// hit an expired token can be replayed with a fresh one.

use std::borrow::Cow;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::error::ApiResult;

/// Payloads longer than this are cut in log output
const LOG_BODY_LIMIT: usize = 2048;

/// An outgoing call to the school API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// `path` is joined onto the configured base URL unless it is already
    /// an absolute http(s) URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A response as received; the body is buffered so it can be logged and
/// handed back unchanged
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Per-attempt bookkeeping, dropped once the matching response is handled
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub id: Uuid,
    pub started: Instant,
    pub retried: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            retried: false,
        }
    }

    /// Context for the single replay after a token refresh
    pub fn retry() -> Self {
        Self {
            retried: true,
            ..Self::new()
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Join a request path onto the base URL
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Header list for log output with credentials masked
pub(crate) fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if name == AUTHORIZATION {
                match value.to_str() {
                    Ok(v) if v.starts_with("Bearer ") => "Bearer [REDACTED]".to_string(),
                    _ => "[REDACTED]".to_string(),
                }
            } else {
                value.to_str().unwrap_or("[binary]").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// Truncate a payload for logging
pub(crate) fn body_preview(body: &str) -> Cow<'_, str> {
    if body.len() <= LOG_BODY_LIMIT {
        return Cow::Borrowed(body);
    }
    let mut end = LOG_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}… ({} bytes)", &body[..end], body.len()))
}
