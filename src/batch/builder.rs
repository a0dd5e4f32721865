use crate::batch::callback::{CallbackMode, ErrorHandler, Hooks};
use crate::batch::dispatcher::BatchDispatcher;
use crate::transport::{BlockingSession, HttpSession, SessionConfig, TransportError};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Runtime and session settings for a dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Coordinator threads driving request tasks and concurrent callbacks.
    pub worker_threads: usize,
    /// Upper bound of the blocking pool running HTTP calls and blocking callbacks.
    pub max_blocking_threads: usize,
    pub session: SessionConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_blocking_threads: 64,
            session: SessionConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `BATCH_HTTP_WORKER_THREADS`,
    /// `BATCH_HTTP_MAX_BLOCKING_THREADS` and the session variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_threads: std::env::var("BATCH_HTTP_WORKER_THREADS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.worker_threads),
            max_blocking_threads: std::env::var("BATCH_HTTP_MAX_BLOCKING_THREADS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_blocking_threads),
            session: SessionConfig::from_env(),
        }
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    pub fn with_max_blocking_threads(mut self, n: usize) -> Self {
        self.max_blocking_threads = n;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::configuration_with_context(
                "worker_threads must be at least 1",
                ErrorContext::new("dispatcher_builder").field("dispatcher.worker_threads"),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(Error::configuration_with_context(
                "max_blocking_threads must be at least 1",
                ErrorContext::new("dispatcher_builder").field("dispatcher.max_blocking_threads"),
            ));
        }
        Ok(())
    }
}

/// Builder for [`BatchDispatcher`].
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    session: Option<Arc<dyn HttpSession>>,
    callback: Option<CallbackMode>,
    error_handler: Option<ErrorHandler>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            session: None,
            callback: None,
            error_handler: None,
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.worker_threads = n;
        self
    }

    pub fn max_blocking_threads(mut self, n: usize) -> Self {
        self.config.max_blocking_threads = n;
        self
    }

    /// Inject the HTTP session instead of building a [`BlockingSession`].
    /// Session settings in the config are ignored when set.
    pub fn session(mut self, session: Arc<dyn HttpSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn callback(mut self, mode: CallbackMode) -> Self {
        self.callback = Some(mode);
        self
    }

    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(f));
        self
    }

    /// Build the dispatcher. Must be called outside of an async context.
    pub fn build(self) -> Result<BatchDispatcher> {
        self.config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .max_blocking_threads(self.config.max_blocking_threads)
            .thread_name("batch-http-worker")
            .enable_all()
            .build()?;

        let session: Arc<dyn HttpSession> = match self.session {
            Some(session) => session,
            None => Arc::new(BlockingSession::new(&self.config.session)?),
        };

        let mut hooks = Hooks::default();
        hooks.callback = self.callback;
        if let Some(handler) = self.error_handler {
            hooks.error_handler = handler;
        }

        Ok(BatchDispatcher::from_parts(runtime, session, hooks))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
