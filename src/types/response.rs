use crate::transport::TransportError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Status code carried by an [`ErrorRecord`]; never a valid HTTP status.
pub const ERROR_STATUS_CODE: u16 = 0;

/// Identifier assigned to each request at enqueue time, increasing per dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fully read HTTP response.
///
/// Any status (including 4xx/5xx) is a successful response here; only
/// transport failures produce an [`ErrorRecord`].
#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: RequestId,
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content: Bytes,
    pub elapsed: Duration,
}

impl Response {
    pub fn new(url: impl Into<String>, status: StatusCode, headers: HeaderMap, content: Bytes) -> Self {
        Self {
            request_id: RequestId::default(),
            url: url.into(),
            status,
            headers,
            content,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.content)?)
    }
}

/// Stand-in for a [`Response`] when the request failed below the HTTP layer.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub request_id: RequestId,
    pub url: String,
    pub text: String,
    pub content: Bytes,
    pub code: u16,
    pub error: Arc<TransportError>,
}

impl ErrorRecord {
    pub fn new(request_id: RequestId, url: impl Into<String>, error: Arc<TransportError>) -> Self {
        Self {
            request_id,
            url: url.into(),
            text: String::new(),
            content: Bytes::new(),
            code: ERROR_STATUS_CODE,
            error,
        }
    }
}

/// What a single enqueued request resolved to.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response(Response),
    Error(ErrorRecord),
}

impl Outcome {
    pub fn request_id(&self) -> RequestId {
        match self {
            Outcome::Response(r) => r.request_id,
            Outcome::Error(e) => e.request_id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Outcome::Response(r) => &r.url,
            Outcome::Error(e) => &e.url,
        }
    }

    /// HTTP status, or [`ERROR_STATUS_CODE`] for failed requests.
    pub fn code(&self) -> u16 {
        match self {
            Outcome::Response(r) => r.status.as_u16(),
            Outcome::Error(e) => e.code,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Outcome::Response(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Outcome::Response(r) => Some(r),
            Outcome::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match self {
            Outcome::Response(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }

    pub fn into_result(self) -> std::result::Result<Response, ErrorRecord> {
        match self {
            Outcome::Response(r) => Ok(r),
            Outcome::Error(e) => Err(e),
        }
    }
}
