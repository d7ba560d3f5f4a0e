//! Immutable request values.
//!
//! # Responsibilities
//! - Hold the assembled request head, body and pre-split URL components
//! - Assign a request ID (UUID v4), honoring an incoming `x-request-id`
//! - Produce rewritten copies for redirects and outbound upstream requests

use std::fmt;

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use hyper::http::request::Parts;
use hyper::{Method, Uri, Version};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::format::UrlComponents;
use crate::net::connection::ConnectionContext;

/// Header used to propagate request IDs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation ID attached to every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Method, target, version and headers of a request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl From<Parts> for RequestHead {
    fn from(parts: Parts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    head: RequestHead,
    body: Option<Bytes>,
    url: UrlComponents,
    context: ConnectionContext,
}

impl Request {
    pub fn new(head: RequestHead, body: Option<Bytes>, context: ConnectionContext) -> Self {
        Self {
            id: RequestId::from_headers(&head.headers),
            url: UrlComponents::from_uri(&head.uri),
            head,
            body,
            context,
        }
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn get(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::GET).uri(uri)
    }

    pub fn post(uri: impl Into<String>) -> RequestBuilder {
        Self::builder().method(Method::POST).uri(uri)
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Path segments and query items of the target.
    pub fn url(&self) -> &UrlComponents {
        &self.url
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.head.method = method;
        self
    }

    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.url = UrlComponents::from_uri(&uri);
        self.head.uri = uri;
        self
    }

    /// Replace every value of `name` with `value`.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        self.head.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.head.headers.remove(name);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Point the request at `base`, keeping its path and query.
    ///
    /// A path on `base` becomes a prefix: `http://api:9000/v2` + `/users?id=1` is
    /// `http://api:9000/v2/users?id=1`. A `Host` header is rewritten to match.
    pub fn redirected_to(self, base: &Url) -> Result<Self> {
        let authority = match base.port() {
            Some(port) => format!("{}:{}", base.host_str().unwrap_or_default(), port),
            None => base.host_str().unwrap_or_default().to_string(),
        };
        if authority.is_empty() {
            return Err(Error::MissingAuthority(base.to_string()));
        }

        let prefix = base.path().trim_end_matches('/');
        let path_and_query = self
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri: Uri = format!("{}://{}{}{}", base.scheme(), authority, prefix, path_and_query).parse()?;

        let rewritten = self.with_uri(uri);
        if rewritten.headers().contains_key(HOST) {
            rewritten.with_header(HOST.as_str(), &authority)
        } else {
            Ok(rewritten)
        }
    }

    /// Build the transport request sent to an upstream.
    ///
    /// An origin-form target is resolved against the `Host` header. Framing headers are
    /// dropped so the length follows the body actually sent.
    pub fn to_outbound(&self) -> Result<hyper::Request<Bytes>> {
        let uri = if self.uri().authority().is_some() {
            self.uri().clone()
        } else {
            let host = self
                .headers()
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| Error::MissingAuthority(self.uri().to_string()))?;
            let path_and_query = self
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            format!("http://{host}{path_and_query}").parse()?
        };

        let mut outbound = hyper::Request::builder()
            .method(self.method().clone())
            .uri(uri)
            .body(self.body.clone().unwrap_or_default())?;
        let headers = outbound.headers_mut();
        *headers = self.headers().clone();
        headers.remove(CONTENT_LENGTH);
        headers.remove(TRANSFER_ENCODING);
        Ok(outbound)
    }
}

/// Builder for requests that did not come off the wire.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    context: Option<ConnectionContext>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn context(mut self, context: ConnectionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<Request> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.append(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        let uri = if self.uri.is_empty() { "/" } else { self.uri.as_str() };
        let head = RequestHead {
            method: self.method,
            uri: uri.parse()?,
            version: Version::HTTP_11,
            headers,
        };
        Ok(Request::new(head, self.body, self.context.unwrap_or_default()))
    }
}
