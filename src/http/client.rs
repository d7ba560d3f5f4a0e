//! Outbound HTTP client used by the redirect middleware.
//!
//! # Design Decisions
//! - The client is a trait so tests can substitute an in-memory upstream
//! - Bodies are fully buffered in both directions

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::Result;

/// Sends one request to an upstream and returns its buffered response.
pub trait UpstreamClient: Send + Sync + 'static {
    fn send(&self, request: hyper::Request<Bytes>) -> BoxFuture<'_, Result<hyper::Response<Bytes>>>;
}

/// Plain-HTTP client backed by the hyper-util connection pool.
#[derive(Clone)]
pub struct HyperClient {
    inner: Client<HttpConnector, Full<Bytes>>,
}

impl HyperClient {
    pub fn new() -> Self {
        let inner = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { inner }
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient").finish_non_exhaustive()
    }
}

impl UpstreamClient for HyperClient {
    fn send(&self, request: hyper::Request<Bytes>) -> BoxFuture<'_, Result<hyper::Response<Bytes>>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let response = self
                .inner
                .request(hyper::Request::from_parts(parts, Full::new(body)))
                .await?;
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok(hyper::Response::from_parts(parts, body))
        })
    }
}
