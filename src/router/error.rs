//! Error types for route registration and handler execution.

use thiserror::Error;

use crate::http::{Method, ResponseError};

/// A route was rejected at registration time.
///
/// Registration happens before any request is served, so these errors are
/// startup failures; they never surface while routing traffic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteValidationError {
    #[error("invalid request method: {0} (expected GET, POST, PUT, HEAD, DELETE or PATCH)")]
    UnsupportedMethod(Method),

    #[error("the url pattern cannot be empty")]
    EmptyPattern,

    #[error("wildcard must be the last segment in '{pattern}'")]
    WildcardNotLast { pattern: String },

    #[error("empty parameter name in '{pattern}'")]
    EmptyParameterName { pattern: String },

    #[error("parameter '{name}' appears more than once in '{pattern}'")]
    DuplicateParameter { pattern: String, name: String },
}

/// A failure raised from inside a route handler.
///
/// Handler errors travel out of [`RouteContext::next`](crate::context::RouteContext::next)
/// untouched and are turned into a response by the dispatcher's error handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HandlerError {
    /// Creates an error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps any other error type.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }
}
