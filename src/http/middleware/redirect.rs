//! Forward requests to a real upstream and rewrite its answer.
//!
//! # Responsibilities
//! - Build the outbound request through a user transform
//! - Copy the upstream status, headers and body into the local response
//! - Let an intercept hook edit the copied response
//!
//! # Design Decisions
//! - `Content-Encoding` is always dropped from the copy, as are framing headers
//!   (`Content-Length`, `Transfer-Encoding`, `Connection`) the transport recomputes
//! - Any failure (transform or network) falls through with the response untouched

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use hyper::header::{CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING};

use crate::error::Result;
use crate::http::client::{HyperClient, UpstreamClient};
use crate::http::middleware::{Middleware, Next};
use crate::http::{Request, Response};

type Transform = dyn Fn(&Request) -> Result<Request> + Send + Sync;
type Intercept = dyn Fn(&mut Response) + Send + Sync;

pub struct Redirect {
    transform: Arc<Transform>,
    intercept: Option<Arc<Intercept>>,
    client: Arc<dyn UpstreamClient>,
}

/// Forward each request as rewritten by `transform`.
pub fn redirect<T>(transform: T) -> Redirect
where
    T: Fn(&Request) -> Result<Request> + Send + Sync + 'static,
{
    Redirect {
        transform: Arc::new(transform),
        intercept: None,
        client: Arc::new(HyperClient::new()),
    }
}

impl Redirect {
    /// Edit the upstream response before the chain continues.
    pub fn intercept<I>(mut self, intercept: I) -> Self
    where
        I: Fn(&mut Response) + Send + Sync + 'static,
    {
        self.intercept = Some(Arc::new(intercept));
        self
    }

    pub fn with_client(mut self, client: impl UpstreamClient) -> Self {
        self.client = Arc::new(client);
        self
    }

    async fn forward(&self, request: &Request, response: &mut Response) -> Result<()> {
        let outbound = (self.transform)(request)?.to_outbound()?;
        let target = outbound.uri().clone();
        tracing::debug!(request_id = %request.id(), upstream = %target, "Forwarding request");

        let upstream = self.client.send(outbound).await?;
        let (parts, body) = upstream.into_parts();
        tracing::debug!(upstream = %target, status = %parts.status, "Upstream responded");

        let mut headers = parts.headers;
        for name in [CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
            headers.remove(name);
        }
        *response.headers_mut() = headers;
        response.set_status(parts.status);
        response.set_body(body);

        if let Some(intercept) = &self.intercept {
            intercept(response);
        }
        Ok(())
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirect")
            .field("intercept", &self.intercept.is_some())
            .finish_non_exhaustive()
    }
}

impl Middleware for Redirect {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(err) = self.forward(request, response).await {
                tracing::warn!(request_id = %request.id(), error = %err, "Redirect failed, falling through");
            }
            next.run();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http::middleware::dispatch;
    use bytes::Bytes;
    use hyper::{StatusCode, Uri};
    use std::sync::Mutex;

    /// Echoes the outbound request back as JSON, gzip-labelled.
    #[derive(Default)]
    struct EchoUpstream {
        seen: Mutex<Vec<hyper::Request<Bytes>>>,
    }

    impl UpstreamClient for Arc<EchoUpstream> {
        fn send(&self, request: hyper::Request<Bytes>) -> BoxFuture<'_, Result<hyper::Response<Bytes>>> {
            let echo = serde_json::json!({
                "method": request.method().as_str(),
                "url": request.uri().to_string(),
                "data": String::from_utf8_lossy(request.body()),
                "custom": request.headers().get("custom-request-header")
                    .and_then(|v| v.to_str().ok()),
            });
            self.seen.lock().unwrap().push(request);
            let response = hyper::Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_ENCODING, "identity")
                .header(CONTENT_LENGTH, "999")
                .header("x-upstream", "echo")
                .body(Bytes::from(echo.to_string()))
                .map_err(Error::from);
            Box::pin(async move { response })
        }
    }

    struct Unreachable;

    impl UpstreamClient for Unreachable {
        fn send(&self, request: hyper::Request<Bytes>) -> BoxFuture<'_, Result<hyper::Response<Bytes>>> {
            let uri = request.uri().to_string();
            Box::pin(async move { Err(Error::MissingAuthority(uri)) })
        }
    }

    fn to_upstream(request: &Request) -> Result<Request> {
        let uri: Uri = format!("http://upstream.test{}", request.uri()).parse()?;
        request
            .clone()
            .with_uri(uri)
            .with_header("custom-request-header", "custom-request-header-value")
    }

    #[tokio::test]
    async fn copies_and_intercepts_upstream_response() {
        let upstream = Arc::new(EchoUpstream::default());
        let middleware = redirect(to_upstream)
            .intercept(|response: &mut Response| {
                let original: serde_json::Value = response
                    .body()
                    .and_then(|body| serde_json::from_slice(body).ok())
                    .unwrap_or_default();
                response.set_status(StatusCode::CREATED);
                response
                    .set_header("custom-response-header", "custom-response-header-value")
                    .unwrap();
                response.set_body(serde_json::json!({ "response": original }).to_string());
            })
            .with_client(Arc::clone(&upstream));

        let request = Request::post("/post?query=value")
            .header("content-type", "text/html; charset=utf-8")
            .body("Hello world!")
            .build()
            .unwrap();
        let response = dispatch(&middleware, &request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(CONTENT_ENCODING).is_none());
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(response.headers()["x-upstream"], "echo");
        assert_eq!(response.headers()["custom-response-header"], "custom-response-header-value");

        let json: serde_json::Value = serde_json::from_slice(response.body().unwrap()).unwrap();
        assert_eq!(json["response"]["method"], "POST");
        assert_eq!(json["response"]["url"], "http://upstream.test/post?query=value");
        assert_eq!(json["response"]["data"], "Hello world!");
        assert_eq!(json["response"]["custom"], "custom-request-header-value");

        let seen = upstream.seen.lock().unwrap();
        assert_eq!(seen[0].headers()["content-type"], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn network_failure_falls_through_unstarted() {
        let middleware = redirect(to_upstream).with_client(Unreachable);
        let request = Request::get("/anything").build().unwrap();
        let response = dispatch(&middleware, &request).await.unwrap();
        assert!(!response.is_started());
        assert_eq!(response.status_code(), None);
    }

    #[tokio::test]
    async fn transform_failure_falls_through() {
        let middleware = redirect(|_: &Request| Err(Error::handler("no upstream")))
            .with_client(Arc::new(EchoUpstream::default()));
        let request = Request::get("/").build().unwrap();
        let response = dispatch(&middleware, &request).await.unwrap();
        assert!(!response.is_started());
    }
}
