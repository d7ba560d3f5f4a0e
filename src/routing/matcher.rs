//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (exact)
//! - Match the request target against a typed [`Format`]
//! - Hand the captured value to the route handler
//!
//! # Design Decisions
//! - Method mismatch falls through without parsing the URL
//! - A format without `end()` matches a prefix of the path
//! - The handler decides whether to call the continuation

use std::fmt;

use futures_util::future::{self, BoxFuture, FutureExt};
use hyper::Method;

use crate::format::Format;
use crate::http::middleware::{IntoOutcome, Middleware, Next};
use crate::http::{Request, Response};

/// A method + format + handler triple.
pub struct Route<A, F> {
    method: Method,
    format: Format<A>,
    handler: F,
}

impl<A, F> Route<A, F> {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn format(&self) -> &Format<A> {
        &self.format
    }
}

impl<A, F> fmt::Debug for Route<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("format", &self.format)
            .finish()
    }
}

/// Build a route; `handler` runs with the captured value when both method and URL match.
pub fn route<A, F, R>(method: Method, format: Format<A>, handler: F) -> Route<A, F>
where
    A: 'static,
    F: Fn(A, &Request, &mut Response, Next<'_>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    Route {
        method,
        format,
        handler,
    }
}

macro_rules! method_routes {
    ($($(#[$doc:meta])* $name:ident => $method:ident,)*) => {
        $(
            $(#[$doc])*
            pub fn $name<A, F, R>(format: Format<A>, handler: F) -> Route<A, F>
            where
                A: 'static,
                F: Fn(A, &Request, &mut Response, Next<'_>) -> R + Send + Sync + 'static,
                R: IntoOutcome,
            {
                route(Method::$method, format, handler)
            }
        )*
    };
}

method_routes! {
    /// `GET` route.
    get => GET,
    /// `PUT` route.
    put => PUT,
    /// `POST` route.
    post => POST,
    /// `PATCH` route.
    patch => PATCH,
    /// `DELETE` route.
    delete => DELETE,
}

impl<A, F, R> Middleware for Route<A, F>
where
    A: 'static,
    F: Fn(A, &Request, &mut Response, Next<'_>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        if request.method() != self.method {
            next.run();
        } else if let Some((_, value)) = self.format.parse_slice(request.url().as_slice()) {
            tracing::trace!(
                method = %self.method,
                template = %self.format.template_string(),
                "Route matched"
            );
            if let Err(err) = (self.handler)(value, request, response, next).into_outcome() {
                response.fail(err);
            }
        } else {
            next.run();
        }
        future::ready(()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::root;
    use crate::http::middleware::dispatch;
    use hyper::StatusCode;

    fn user_route() -> impl Middleware {
        get(
            root().path("users").int().end(),
            |(id,): (i64,), _: &Request, res: &mut Response, next: Next<'_>| {
                res.send_string(StatusCode::OK, format!("user {id}"));
                next.run();
            },
        )
    }

    #[tokio::test]
    async fn typed_capture_reaches_handler() {
        let request = Request::get("/users/42").build().unwrap();
        let response = dispatch(&user_route(), &request).await.unwrap();
        assert_eq!(response.body().unwrap().as_ref(), b"user 42");
    }

    #[tokio::test]
    async fn coercion_failure_falls_through() {
        let request = Request::get("/users/abc").build().unwrap();
        let response = dispatch(&user_route(), &request).await.unwrap();
        assert!(!response.is_started());
    }

    #[tokio::test]
    async fn method_mismatch_falls_through() {
        let request = Request::post("/users/42").build().unwrap();
        let response = dispatch(&user_route(), &request).await.unwrap();
        assert_eq!(response.status_code(), None);
    }

    #[tokio::test]
    async fn handler_errors_fail_the_response() {
        let failing = post(
            root().path("boom"),
            |(), _: &Request, _: &mut Response, _: Next<'_>| -> crate::Result<()> {
                Err(crate::Error::handler("broken handler"))
            },
        );
        let request = Request::post("/boom").build().unwrap();
        assert!(dispatch(&failing, &request).await.is_err());
    }

    #[test]
    fn debug_shows_template() {
        let route = delete(
            root().path("items").int(),
            |_: (i64,), _: &Request, _: &mut Response, next: Next<'_>| next.run(),
        );
        assert_eq!(route.method(), Method::DELETE);
        assert_eq!(
            format!("{route:?}"),
            "Route { method: DELETE, format: Format(\"/items/:Int\") }"
        );
    }
}
