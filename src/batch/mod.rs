//! # Batch Dispatch Module
//!
//! Concurrent dispatch of blocking HTTP requests with completion
//! synchronization.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchDispatcher`] | Owns the runtime and session; enqueues and awaits requests |
//! | [`BatchScope`] | Resets the batch on entry, waits for all requests on exit |
//! | [`CallbackMode`] | `Direct`, `Blocking` or `Concurrent` callback execution |
//! | [`DispatcherBuilder`] | Thread pool, session and hook configuration |
//!
//! ## Example
//!
//! ```rust,no_run
//! use batch_http::batch::{BatchDispatcher, CallbackMode};
//! use batch_http::types::RequestOptions;
//!
//! # fn main() -> batch_http::Result<()> {
//! let dispatcher = BatchDispatcher::builder()
//!     .callback(CallbackMode::direct(|outcome| {
//!         println!("{} -> {}", outcome.url(), outcome.code());
//!         Ok(())
//!     }))
//!     .build()?;
//!
//! let results = dispatcher.batch(|scope| {
//!     for _ in 0..5 {
//!         scope.get("https://example.com", RequestOptions::default());
//!     }
//!     Ok(())
//! })?;
//! assert_eq!(results.len(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Callback modes
//!
//! - **Direct**: runs on the coordinating task right after the request resolves
//! - **Blocking**: runs on the blocking pool; the request counts as pending until it returns
//! - **Concurrent**: the returned future is spawned and joined by `await_all`

mod builder;
mod callback;
mod dispatcher;
mod scope;

pub use builder::{DispatcherBuilder, DispatcherConfig};
pub use callback::{log_error_handler, AsyncCallback, Callback, CallbackFailure, CallbackMode, ErrorHandler};
pub use dispatcher::{BatchDispatcher, BatchSummary, RequestHandle};
pub use scope::BatchScope;
