use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Where a configuration or runtime error came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Component that raised the error (e.g., "method_parser", "dispatcher_builder")
    pub source: &'static str,
    /// Offending field or setting (e.g., "request.method")
    pub field_path: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            field_path: None,
            details: None,
        }
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " (")?;
        if let Some(field) = &self.field_path {
            write!(f, "field: {}, ", field)?;
        }
        if let Some(details) = &self.details {
            write!(f, "details: {}, ", details)?;
        }
        write!(f, "source: {})", self.source)
    }
}

/// Unified error type for batch dispatching.
///
/// Per-request transport failures are never returned through this type from
/// `enqueue`/`await_all`; they become [`crate::types::ErrorRecord`]s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{context}")]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Callback error: {failed} callback(s) failed; first for {url}: {message}")]
    Callback {
        failed: usize,
        url: String,
        message: String,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}
