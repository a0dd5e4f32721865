//! Batch dispatcher: runs blocking HTTP calls on a worker pool and collects outcomes.

use crate::batch::builder::DispatcherBuilder;
use crate::batch::callback::{CallbackFailure, CallbackMode, ErrorHandler, Hooks};
use crate::batch::scope::BatchScope;
use crate::transport::{HttpSession, TransportError};
use crate::types::{ErrorRecord, Method, Outcome, RequestDescriptor, RequestId, RequestOptions, Response};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwap;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Correlation token returned by `enqueue`.
///
/// It does not own the request; once it has resolved, look its outcome up
/// with [`BatchDispatcher::outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    pub id: RequestId,
    pub method: Method,
    pub url: String,
}

/// Counts over the outcomes collected so far in the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    pub elapsed: Duration,
}

struct Tracked {
    url: String,
    handle: JoinHandle<()>,
}

/// Pending tasks, results and callback failures of one batch.
///
/// A reset swaps in a fresh state; tasks still holding the old one finish
/// into it and are never observed again.
struct BatchState {
    pending: Mutex<Vec<Tracked>>,
    results: Mutex<Vec<Outcome>>,
    failures: Mutex<Vec<CallbackFailure>>,
    inflight: AtomicUsize,
    started: Instant,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BatchState {
    fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            inflight: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    fn track(&self, url: String, handle: JoinHandle<()>) {
        lock(&self.pending).push(Tracked { url, handle });
    }

    fn push_result(&self, outcome: Outcome) {
        lock(&self.results).push(outcome);
    }

    fn record_failure(&self, url: &str, message: String) {
        warn!(url, error = %message, "callback failed");
        lock(&self.failures).push(CallbackFailure {
            url: url.to_string(),
            message,
        });
    }

    /// Join every tracked task, including ones spawned while joining.
    async fn join_pending(&self) {
        loop {
            let batch: Vec<Tracked> = std::mem::take(&mut *lock(&self.pending));
            if batch.is_empty() {
                break;
            }
            let (urls, handles): (Vec<_>, Vec<_>) =
                batch.into_iter().map(|t| (t.url, t.handle)).unzip();
            let joined = futures::future::join_all(handles).await;
            for (url, res) in urls.iter().zip(joined) {
                if let Err(e) = res {
                    self.record_failure(url, join_error_message("callback", e));
                }
            }
        }
    }
}

/// `who` names the panicking party, e.g. "callback" or "session".
fn panic_message(who: &str, payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("{} panicked: {}", who, s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("{} panicked: {}", who, s)
    } else {
        format!("{} panicked", who)
    }
}

fn join_error_message(who: &str, err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        panic_message(who, err.into_panic())
    } else {
        err.to_string()
    }
}

/// Dispatches HTTP requests concurrently and collects their outcomes.
///
/// The dispatcher owns its tokio runtime and HTTP session. Its API is
/// blocking: `await_all`, [`BatchDispatcher::scope`] and dropping the
/// dispatcher must happen outside of an async context.
pub struct BatchDispatcher {
    session: Arc<dyn HttpSession>,
    hooks: ArcSwap<Hooks>,
    state: ArcSwap<BatchState>,
    next_id: AtomicU64,
    runtime: Runtime,
}

impl BatchDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatcher with default configuration and a reqwest session.
    pub fn new() -> Result<Self> {
        DispatcherBuilder::new().build()
    }

    pub(crate) fn from_parts(runtime: Runtime, session: Arc<dyn HttpSession>, hooks: Hooks) -> Self {
        Self {
            session,
            hooks: ArcSwap::from_pointee(hooks),
            state: ArcSwap::from_pointee(BatchState::new()),
            next_id: AtomicU64::new(0),
            runtime,
        }
    }

    /// Enqueue a request by method name. Anything but GET/POST is rejected
    /// before dispatch.
    pub fn enqueue(&self, method: &str, url: &str, options: RequestOptions) -> Result<RequestHandle> {
        let method: Method = method.parse()?;
        Ok(self.submit(RequestDescriptor::new(method, url, options)))
    }

    pub fn get(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.submit(RequestDescriptor::new(Method::Get, url, options))
    }

    pub fn post(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.submit(RequestDescriptor::new(Method::Post, url, options))
    }

    /// Dispatch a request with the hooks in effect right now.
    pub fn submit(&self, request: RequestDescriptor) -> RequestHandle {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let hooks = self.hooks.load_full();
        let state = self.state.load_full();
        let handle = RequestHandle {
            id,
            method: request.method,
            url: request.url.clone(),
        };

        debug!(
            request_id = id.0,
            method = %request.method,
            url = %request.url,
            mode = hooks.callback.as_ref().map(|m| m.name()).unwrap_or("none"),
            "dispatching request"
        );

        state.inflight.fetch_add(1, Ordering::SeqCst);
        let task = self.runtime.spawn(run_request(
            Arc::clone(&self.session),
            Arc::clone(&state),
            hooks,
            id,
            request,
        ));
        state.track(handle.url.clone(), task);
        handle
    }

    /// Block until every pending request and callback task has finished.
    ///
    /// Transport failures never make this fail; callback failures collected
    /// since the previous call are reported as [`Error::Callback`].
    pub fn await_all(&self) -> Result<()> {
        let state = self.state.load_full();
        self.runtime.block_on(state.join_pending());

        let failures = std::mem::take(&mut *lock(&state.failures));
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(Error::Callback {
                failed: failures.len(),
                url: first.url.clone(),
                message: first.message.clone(),
            }),
        }
    }

    /// Start a fresh batch: previous results and pending tasks are dropped.
    pub fn reset(&self) {
        let old = self.state.swap(Arc::new(BatchState::new()));
        let detached = lock(&old.pending).len();
        if detached > 0 {
            debug!(detached, "batch reset with requests still pending");
        }
    }

    /// Reset and open a scope that waits for all requests when it ends.
    pub fn scope(&self) -> BatchScope<'_> {
        self.reset();
        BatchScope::new(self)
    }

    /// Run `f` inside a fresh scope and return the collected outcomes.
    ///
    /// Requests enqueued by `f` are awaited even when `f` fails.
    pub fn batch<F>(&self, f: F) -> Result<Vec<Outcome>>
    where
        F: FnOnce(&BatchScope<'_>) -> Result<()>,
    {
        let scope = self.scope();
        f(&scope)?;
        scope.finish()
    }

    /// Outcomes collected so far, in completion order.
    pub fn results(&self) -> Vec<Outcome> {
        lock(&self.state.load().results).clone()
    }

    /// Outcome of one request of the current batch, once it has resolved.
    pub fn outcome(&self, id: RequestId) -> Option<Outcome> {
        lock(&self.state.load().results)
            .iter()
            .find(|o| o.request_id() == id)
            .cloned()
    }

    pub fn take_results(&self) -> Vec<Outcome> {
        std::mem::take(&mut *lock(&self.state.load().results))
    }

    /// Requests of the current batch that have not produced an outcome yet.
    pub fn pending_count(&self) -> usize {
        self.state.load().inflight.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> BatchSummary {
        let state = self.state.load();
        let results = lock(&state.results);
        let failed = results.iter().filter(|o| o.is_error()).count();
        BatchSummary {
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
            pending: state.inflight.load(Ordering::SeqCst),
            elapsed: state.started.elapsed(),
        }
    }

    /// Replace the callback for requests enqueued from now on.
    pub fn set_callback(&self, mode: CallbackMode) {
        self.hooks.rcu(|current| {
            let mut next = Hooks::clone(current);
            next.callback = Some(mode.clone());
            next
        });
    }

    pub fn clear_callback(&self) {
        self.hooks.rcu(|current| {
            let mut next = Hooks::clone(current);
            next.callback = None;
            next
        });
    }

    /// Replace the error handler for requests enqueued from now on.
    pub fn set_error_handler<F>(&self, f: F)
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(f);
        self.hooks.rcu(|current| {
            let mut next = Hooks::clone(current);
            next.error_handler = Arc::clone(&handler);
            next
        });
    }

    /// Run one request on the worker pool without callbacks or batch
    /// bookkeeping. The returned future can be awaited from any executor.
    pub fn fetch(&self, request: RequestDescriptor) -> impl Future<Output = Result<Response>> + Send + 'static {
        let session = Arc::clone(&self.session);
        let url = request.url.clone();
        let handle = self.runtime.spawn_blocking(move || session.execute(&request));
        async move {
            match handle.await {
                Ok(res) => res.map_err(Error::from),
                Err(e) => Err(Error::runtime_with_context(
                    join_error_message("session", e),
                    ErrorContext::new("dispatcher_fetch").details(url),
                )),
            }
        }
    }

    pub fn fetch_get(&self, url: &str, options: RequestOptions) -> impl Future<Output = Result<Response>> + Send + 'static {
        self.fetch(RequestDescriptor::new(Method::Get, url, options))
    }

    pub fn fetch_post(&self, url: &str, options: RequestOptions) -> impl Future<Output = Result<Response>> + Send + 'static {
        self.fetch(RequestDescriptor::new(Method::Post, url, options))
    }
}

async fn run_request(
    session: Arc<dyn HttpSession>,
    state: Arc<BatchState>,
    hooks: Arc<Hooks>,
    id: RequestId,
    request: RequestDescriptor,
) {
    let url = request.url.clone();
    let error_handler = Arc::clone(&hooks.error_handler);

    // The handler runs on the worker; its panic is reported like a callback
    // failure while the outcome keeps the real transport error.
    let worker = tokio::task::spawn_blocking(move || match session.execute(&request) {
        Ok(mut response) => {
            response.request_id = id;
            (Outcome::Response(response), None)
        }
        Err(err) => {
            let handler_panic = std::panic::catch_unwind(AssertUnwindSafe(|| error_handler(&err)))
                .err()
                .map(|payload| panic_message("error handler", payload));
            (Outcome::Error(ErrorRecord::new(id, request.url, Arc::new(err))), handler_panic)
        }
    });

    let outcome = match worker.await {
        Ok((outcome, handler_panic)) => {
            if let Some(message) = handler_panic {
                state.record_failure(&url, message);
            }
            outcome
        }
        Err(e) => {
            let err = TransportError::Other(format!("request worker failed: {}", join_error_message("session", e)));
            Outcome::Error(ErrorRecord::new(id, url.clone(), Arc::new(err)))
        }
    };

    debug!(
        request_id = id.0,
        url = %url,
        code = outcome.code(),
        "request completed"
    );

    match &hooks.callback {
        None => {}
        Some(CallbackMode::Direct(cb)) => {
            match std::panic::catch_unwind(AssertUnwindSafe(|| cb(&outcome))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => state.record_failure(&url, format!("{:#}", e)),
                Err(payload) => state.record_failure(&url, panic_message("callback", payload)),
            }
        }
        Some(CallbackMode::Blocking(cb)) => {
            let cb = Arc::clone(cb);
            let delivered = outcome.clone();
            match tokio::task::spawn_blocking(move || cb(&delivered)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => state.record_failure(&url, format!("{:#}", e)),
                Err(e) => state.record_failure(&url, join_error_message("callback", e)),
            }
        }
        Some(CallbackMode::Concurrent(cb)) => {
            match std::panic::catch_unwind(AssertUnwindSafe(|| cb(outcome.clone()))) {
                Ok(fut) => {
                    let task_state = Arc::clone(&state);
                    let task_url = url.clone();
                    let task = tokio::spawn(async move {
                        if let Err(e) = fut.await {
                            task_state.record_failure(&task_url, format!("{:#}", e));
                        }
                    });
                    state.track(url.clone(), task);
                }
                Err(payload) => state.record_failure(&url, panic_message("callback", payload)),
            }
        }
    }

    state.push_result(outcome);
    state.inflight.fetch_sub(1, Ordering::SeqCst);
}
