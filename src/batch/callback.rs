//! Callback execution modes and per-request hook snapshots.

use crate::transport::TransportError;
use crate::types::Outcome;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with a borrowed outcome.
pub type Callback = Arc<dyn Fn(&Outcome) -> anyhow::Result<()> + Send + Sync>;

/// Callback producing a future that runs as its own task.
pub type AsyncCallback = Arc<dyn Fn(Outcome) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Side channel invoked on the worker thread before an error record is built.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// How the callback for each outcome is run.
#[derive(Clone)]
pub enum CallbackMode {
    /// Run inline on the coordinating task. Must not block.
    Direct(Callback),
    /// Run on a blocking worker; the request is not complete until it returns.
    Blocking(Callback),
    /// Spawn the returned future as a separate task awaited by `await_all`.
    Concurrent(AsyncCallback),
}

impl CallbackMode {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&Outcome) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        CallbackMode::Direct(Arc::new(f))
    }

    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&Outcome) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        CallbackMode::Blocking(Arc::new(f))
    }

    pub fn concurrent<F, Fut>(f: F) -> Self
    where
        F: Fn(Outcome) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        CallbackMode::Concurrent(Arc::new(move |outcome| Box::pin(f(outcome))))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallbackMode::Direct(_) => "direct",
            CallbackMode::Blocking(_) => "blocking",
            CallbackMode::Concurrent(_) => "concurrent",
        }
    }
}

impl fmt::Debug for CallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackMode::{}", self.name())
    }
}

/// Default error handler: log and move on.
pub fn log_error_handler() -> ErrorHandler {
    Arc::new(|err: &TransportError| {
        tracing::warn!(error = %err, timeout = err.is_timeout(), "request failed");
    })
}

/// Hooks in effect for one request, captured when it is enqueued.
#[derive(Clone)]
pub(crate) struct Hooks {
    pub callback: Option<CallbackMode>,
    pub error_handler: ErrorHandler,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            callback: None,
            error_handler: log_error_handler(),
        }
    }
}

/// A callback that returned an error or panicked.
#[derive(Debug, Clone)]
pub struct CallbackFailure {
    pub url: String,
    pub message: String,
}
