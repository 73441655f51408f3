//! Error types.
//!
//! Routing misses and authorization failures are not errors: they are fixed
//! HTTP responses produced by the dispatcher. The types here cover the two
//! remaining cases: infrastructure failures ([`Error`]) and failures raised by
//! application handlers ([`HandlerError`]), which the dispatcher maps onto
//! `400` and `500` responses.

use thiserror::Error;

/// The error type returned by lime's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding the listener or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A caller passed an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// A request body could not be parsed as `key=value` pairs.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("form field `{0}` has no `=` separator")]
    MissingSeparator(String),

    #[error("form field is not valid percent-encoded UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

/// Failure raised by a route handler.
///
/// Handlers return `Result<T, HandlerError>` and use `?` freely: a malformed
/// request body becomes `400 Bad Request`, everything else
/// `500 Internal Server Error`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    BadRequest(#[from] FormError),

    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HandlerError {
    /// Wraps any error as an internal (500) failure.
    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<Error> for HandlerError {
    fn from(e: Error) -> Self {
        Self::internal(e)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(e)
    }
}
