//! # Types Module
//!
//! Request and outcome types shared by the dispatcher and the HTTP session.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestDescriptor`] | Method, url and options of one request |
//! | [`RequestOptions`] | Headers, query, timeout, body and auth passed to the session |
//! | [`Response`] | Fully read response (any HTTP status) |
//! | [`ErrorRecord`] | Stand-in for a response when the transport failed |
//! | [`Outcome`] | `Response` or `ErrorRecord` |

pub mod request;
pub mod response;

pub use request::{Body, Method, RequestDescriptor, RequestOptions};
pub use response::{ErrorRecord, Outcome, RequestId, Response, ERROR_STATUS_CODE};
