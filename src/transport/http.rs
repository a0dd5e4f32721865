use crate::types::{Body, Method, RequestDescriptor, RequestOptions, Response};
use crate::{Error, ErrorContext, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Proxy;
use std::env;
use std::time::{Duration, Instant};

/// Blocking HTTP session shared by every worker of a dispatcher.
///
/// Implementations must be safe to call from many worker threads at once.
pub trait HttpSession: Send + Sync + 'static {
    fn get(&self, url: &str, options: &RequestOptions) -> std::result::Result<Response, TransportError>;

    fn post(&self, url: &str, options: &RequestOptions) -> std::result::Result<Response, TransportError>;

    fn execute(&self, request: &RequestDescriptor) -> std::result::Result<Response, TransportError> {
        match request.method {
            Method::Get => self.get(&request.url, &request.options),
            Method::Post => self.post(&request.url, &request.options),
        }
    }
}

/// Connection settings for [`BlockingSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Session-wide default timeout. Per-request timeouts take precedence.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy_url: Option<String>,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            proxy_url: None,
            user_agent: concat!("batch-http/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `BATCH_HTTP_*` environment variables.
    ///
    /// Unparsable numeric values are ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: env_u64("BATCH_HTTP_TIMEOUT_SECS").map(Duration::from_secs),
            connect_timeout: env_u64("BATCH_HTTP_CONNECT_TIMEOUT_SECS").map(Duration::from_secs),
            pool_max_idle_per_host: env::var("BATCH_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.pool_max_idle_per_host),
            pool_idle_timeout: env_u64("BATCH_HTTP_POOL_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
            proxy_url: env::var("BATCH_HTTP_PROXY_URL").ok().filter(|s| !s.is_empty()),
            user_agent: env::var("BATCH_HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

/// [`HttpSession`] backed by a pooled `reqwest::blocking::Client`.
///
/// Must be constructed and dropped outside of an async context; reqwest's
/// blocking client owns an internal runtime.
pub struct BlockingSession {
    client: Client,
}

impl BlockingSession {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout);

        if let Some(connect) = config.connect_timeout {
            builder = builder.connect_timeout(connect);
        }

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    ErrorContext::new("blocking_session").field("session.proxy_url"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn prepare(&self, method: Method, url: &str, options: &RequestOptions) -> RequestBuilder {
        let mut req = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            req = req.timeout(timeout);
        }
        if let Some(token) = &options.bearer_token {
            req = req.bearer_auth(token);
        }
        if let Some((user, password)) = &options.basic_auth {
            req = req.basic_auth(user, password.as_ref());
        }

        match &options.body {
            Some(Body::Text(text)) => req.body(text.clone()),
            Some(Body::Bytes(bytes)) => req.body(bytes.clone()),
            Some(Body::Json(value)) => req.json(value),
            Some(Body::Form(fields)) => req.form(fields),
            None => req,
        }
    }

    fn send(&self, method: Method, url: &str, options: &RequestOptions) -> std::result::Result<Response, TransportError> {
        let started = Instant::now();
        let resp = self.prepare(method, url, options).send()?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let final_url = resp.url().to_string();
        // Body is read on the worker so callers never block on it later.
        let content = resp.bytes()?;
        Ok(Response::new(final_url, status, headers, content).with_elapsed(started.elapsed()))
    }
}

impl HttpSession for BlockingSession {
    fn get(&self, url: &str, options: &RequestOptions) -> std::result::Result<Response, TransportError> {
        self.send(Method::Get, url, options)
    }

    fn post(&self, url: &str, options: &RequestOptions) -> std::result::Result<Response, TransportError> {
        self.send(Method::Post, url, options)
    }
}

/// Failure below the HTTP semantic layer (connect, DNS, timeout, body read).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout(),
            TransportError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn is_connect(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect(),
            TransportError::Connect(_) => true,
            _ => false,
        }
    }
}
