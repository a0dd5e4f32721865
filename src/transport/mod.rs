//! # Transport Module
//!
//! The HTTP client collaborator. The dispatcher only ever talks to an
//! [`HttpSession`]; [`BlockingSession`] is the reqwest-backed implementation
//! with connection pooling handled entirely by reqwest.

pub mod http;

pub use http::{BlockingSession, HttpSession, SessionConfig, TransportError};
