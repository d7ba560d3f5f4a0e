//! Crate-wide error type.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::net::connection::StateViolation;
use crate::net::listener::ListenerError;

/// Boxed error produced by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// `start` was called on a server that is already listening.
    #[error("server is already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The accept loop did not acknowledge shutdown in time.
    #[error("server did not release its listener within {0:?}")]
    StopTimeout(Duration),

    #[error("invalid request: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("invalid uri parts: {0}")]
    InvalidUriParts(#[from] hyper::http::uri::InvalidUriParts),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] hyper::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] hyper::header::InvalidHeaderValue),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Outbound request has neither an absolute uri nor a `Host` header.
    #[error("cannot determine upstream authority for {0}")]
    MissingAuthority(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("http transport error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    State(#[from] StateViolation),

    /// The middleware chain resolved without completing the response.
    #[error("middleware chain paused without completing the response")]
    Abandoned,

    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl Error {
    /// Wrap an arbitrary handler error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Error::Handler(err.into())
    }
}
