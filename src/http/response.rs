//! Mutable response accumulator.
//!
//! # Responsibilities
//! - Hold status, headers and body while middleware runs
//! - Track whether the response has been started
//! - Provide string and JSON senders with the right content types
//!
//! # Design Decisions
//! - An unset status reads as `200 OK` but is kept distinct for the not-found check
//! - Setting the status or the body starts the response; header edits do not
//! - Repeated sends replace status and body and merge headers name by name

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use serde::Serialize;

use crate::error::{Error, Result};

/// `Content-Type` set by [`Response::send_json`].
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
/// `Content-Type` set by [`Response::send_string`].
pub const TEXT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Option<Bytes>,
    started: bool,
    failure: Option<Error>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status, `200 OK` when none was set.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// The status exactly as set, `None` when untouched.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.started = true;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replace every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Add `value` alongside any existing values of `name`.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
        self.started = true;
    }

    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// True once a status or body was set, or a handler failed.
    pub fn is_started(&self) -> bool {
        self.started || self.failure.is_some()
    }

    pub fn send_string(&mut self, status: StatusCode, body: impl Into<String>) {
        self.send_string_with(status, HeaderMap::new(), body);
    }

    pub fn send_string_with(&mut self, status: StatusCode, headers: HeaderMap, body: impl Into<String>) {
        self.send(status, headers, TEXT_CONTENT_TYPE, Bytes::from(body.into()));
    }

    /// Send the canonical reason phrase of `status` as the body.
    pub fn send_reason(&mut self, status: StatusCode) {
        let reason = status.canonical_reason().unwrap_or_default();
        self.send_string(status, reason);
    }

    pub fn send_json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<()> {
        self.send_json_with(status, HeaderMap::new(), value)
    }

    pub fn send_json_with<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        headers: HeaderMap,
        value: &T,
    ) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        self.send(status, headers, JSON_CONTENT_TYPE, Bytes::from(body));
        Ok(())
    }

    /// Merge `headers`, then set the content type unless `headers` carried one.
    fn send(&mut self, status: StatusCode, headers: HeaderMap, content_type: &'static str, body: Bytes) {
        let overridden = headers.contains_key(CONTENT_TYPE);
        let mut last_name = None;
        for (name, value) in headers {
            match name {
                Some(name) => {
                    self.headers.insert(name.clone(), value);
                    last_name = Some(name);
                }
                // Further values of the previous name.
                None => {
                    if let Some(name) = &last_name {
                        self.headers.append(name.clone(), value);
                    }
                }
            }
        }
        if !overridden {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        self.set_status(status);
        self.set_body(body);
    }

    /// Record a handler failure; the exchange ends without a response.
    pub fn fail(&mut self, err: Error) {
        self.failure = Some(err);
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    /// Convert into the transport response.
    pub fn into_http(self) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::new(Full::new(self.body.unwrap_or_default()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_status_reads_as_ok() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.status_code(), None);
        assert!(!response.is_started());
    }

    #[test]
    fn headers_alone_do_not_start() {
        let mut response = Response::new();
        response.set_header("x-mock", "1").unwrap();
        assert!(!response.is_started());
        response.set_body("hi");
        assert!(response.is_started());
        assert_eq!(response.status_code(), None);
    }

    #[test]
    fn send_json_sets_content_type() {
        let mut response = Response::new();
        response
            .send_json(StatusCode::CREATED, &serde_json::json!({ "id": 1 }))
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(response.body().unwrap().as_ref(), br#"{"id":1}"#);
    }

    #[test]
    fn send_reason_uses_reason_phrase() {
        let mut response = Response::new();
        response.send_reason(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_CONTENT_TYPE);
        assert_eq!(response.body().unwrap().as_ref(), b"Not Found");
    }

    #[test]
    fn second_send_merges_headers() {
        let mut first = HeaderMap::new();
        first.insert("x-a", HeaderValue::from_static("1"));
        first.insert("x-b", HeaderValue::from_static("1"));
        let mut second = HeaderMap::new();
        second.insert("x-b", HeaderValue::from_static("2"));

        let mut response = Response::new();
        response.send_string_with(StatusCode::OK, first, "one");
        response.send_string_with(StatusCode::ACCEPTED, second, "two");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-a"], "1");
        assert_eq!(response.headers()["x-b"], "2");
        assert_eq!(response.headers().get_all("x-b").iter().count(), 1);
        assert_eq!(response.body().unwrap().as_ref(), b"two");
    }

    #[test]
    fn caller_content_type_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let mut response = Response::new();
        response.send_string_with(StatusCode::OK, headers, "plain");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn into_http_defaults_to_ok() {
        let http = Response::new().into_http();
        assert_eq!(http.status(), StatusCode::OK);
    }
}
