//! Turn stub and redirect entries into a router.
//!
//! # Data Flow
//! ```text
//! MockConfig
//!     → stubs:     [[stubs]] in file order, each a canned response
//!     → redirects: [[redirects]] in file order, each forwarding to an upstream
//!     → Router(stubs, redirects) + default 404
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::{MockConfig, RedirectConfig, StubConfig};
use crate::config::validation::ValidationError;
use crate::error::{Error, Result};
use crate::format::{compile, Format, Param};
use crate::http::middleware::{delay, from_fn, redirect, BoxMiddleware, Middleware, Next};
use crate::http::{Request, Response};
use crate::routing::{route, Router, Service};

/// Build the router serving every configured stub, then every redirect.
pub fn build_router(config: &MockConfig) -> Result<Router, ConfigError> {
    let mut stubs = Service::new("stubs");
    for stub in &config.stubs {
        stubs = stubs.route(stub_route(stub)?);
    }

    let mut redirects = Service::new("redirects");
    for entry in &config.redirects {
        redirects = redirects.route(redirect_route(entry)?);
    }

    tracing::debug!(
        stubs = config.stubs.len(),
        redirects = config.redirects.len(),
        "Router built from config"
    );
    Ok(Router::new().service(stubs).service(redirects))
}

/// Runs `inner` only when the method (if any) and the path format match.
///
/// Used where `inner` is asynchronous: redirects and delayed stubs.
struct Matched {
    method: Option<Method>,
    format: Format<Vec<Param>>,
    inner: BoxMiddleware,
}

impl Middleware for Matched {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        let method_ok = self.method.as_ref().map_or(true, |m| m == request.method());
        if method_ok && self.format.parse_slice(request.url().as_slice()).is_some() {
            self.inner.call(request, response, next)
        } else {
            next.run();
            future::ready(()).boxed()
        }
    }
}

fn with_delay(delay_ms: u64, inner: impl Middleware) -> BoxMiddleware {
    if delay_ms > 0 {
        Arc::new(delay(Duration::from_millis(delay_ms), inner))
    } else {
        Arc::new(inner)
    }
}

fn parse_method(entry: &str, method: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
        ConfigError::Validation(vec![ValidationError::UnsupportedMethod {
            stub: entry.to_string(),
            method: method.to_string(),
        }])
    })
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(value)?);
    }
    Ok(map)
}

fn stub_route(stub: &StubConfig) -> Result<BoxMiddleware, ConfigError> {
    let method = parse_method(&stub.name, &stub.method)?;
    let status = StatusCode::from_u16(stub.status).map_err(|_| {
        ConfigError::Validation(vec![ValidationError::InvalidStatus {
            stub: stub.name.clone(),
            status: stub.status,
        }])
    })?;
    let headers = header_map(&stub.headers)?;
    let body = stub.body.clone();
    let json = stub.json.clone();
    let format = compile(&stub.path, stub.exact)?;

    let respond = move |res: &mut Response| -> Result<()> {
        match (&json, &body) {
            (Some(json), _) => res.send_json_with(status, headers.clone(), json)?,
            (None, Some(body)) => res.send_string_with(status, headers.clone(), body.as_str()),
            (None, None) => {
                res.headers_mut().extend(headers.clone());
                res.set_status(status);
            }
        }
        Ok(())
    };

    if stub.delay_ms == 0 {
        return Ok(Arc::new(route(
            method,
            format,
            move |_: Vec<Param>, _: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                respond(res)?;
                next.run();
                Ok(())
            },
        )));
    }

    let respond = from_fn(move |_: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
        respond(res)?;
        next.run();
        Ok(())
    });
    Ok(Arc::new(Matched {
        method: Some(method),
        format,
        inner: with_delay(stub.delay_ms, respond),
    }))
}

fn redirect_route(entry: &RedirectConfig) -> Result<Matched, ConfigError> {
    let method = entry
        .method
        .as_deref()
        .map(|method| parse_method(&entry.name, method))
        .transpose()?;
    let upstream = Url::parse(&entry.upstream).map_err(Error::from)?;
    let headers = entry.headers.clone();

    let forward = redirect(move |request: &Request| {
        let mut outbound = request.clone().redirected_to(&upstream)?;
        for (name, value) in &headers {
            outbound = outbound.with_header(name, value)?;
        }
        Ok(outbound)
    });

    Ok(Matched {
        method,
        format: compile(&entry.path, false)?,
        inner: with_delay(entry.delay_ms, forward),
    })
}
