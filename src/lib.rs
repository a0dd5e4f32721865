//! # batch-http
//!
//! Dispatch batches of HTTP GET/POST requests concurrently and collect their
//! outcomes.
//!
//! ## Overview
//!
//! A [`BatchDispatcher`] runs each enqueued request as a blocking call on a
//! worker pool, hands every result to an optional callback, and collects all
//! outcomes until the batch is awaited. A request that fails at the transport
//! level never fails the batch: it becomes an [`ErrorRecord`] and is reported
//! to the error handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_http::{BatchDispatcher, RequestOptions};
//! use std::time::Duration;
//!
//! fn main() -> batch_http::Result<()> {
//!     let dispatcher = BatchDispatcher::new()?;
//!
//!     {
//!         let scope = dispatcher.scope();
//!         for _ in 0..5 {
//!             scope.get("https://example.com", RequestOptions::default());
//!         }
//!     } // waits for all five
//!     println!("{:?}", dispatcher.summary());
//!
//!     let outcomes = dispatcher.batch(|scope| {
//!         scope.enqueue(
//!             "GET",
//!             "https://example.com",
//!             RequestOptions::new().with_timeout(Duration::from_millis(1)),
//!         )?;
//!         Ok(())
//!     })?;
//!     assert!(outcomes[0].is_error());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Dispatcher, scopes, callback modes and configuration |
//! | [`transport`] | HTTP session trait and the reqwest-backed session |
//! | [`types`] | Request descriptors, responses and error records |

pub mod batch;
pub mod transport;
pub mod types;

pub use batch::{BatchDispatcher, BatchScope, BatchSummary, CallbackMode, DispatcherBuilder, DispatcherConfig, RequestHandle};
pub use transport::{BlockingSession, HttpSession, SessionConfig, TransportError};
pub use types::{Body, ErrorRecord, Method, Outcome, RequestDescriptor, RequestId, RequestOptions, Response};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

pub mod error;
pub use error::{Error, ErrorContext};
