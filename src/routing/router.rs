//! Middleware composition: chains, services and routers.
//!
//! # Responsibilities
//! - Run middleware in declaration order with fallthrough
//! - Stop as soon as a middleware starts the response
//! - Group routes into named [`Service`]s and flatten them into one [`Router`]
//! - Answer unmatched requests with a not-found terminal
//!
//! # Design Decisions
//! - First match wins; declaration order is the only tie-break
//! - A started response ends the chain even if its middleware also called `next`
//! - A middleware that neither starts the response nor calls `next` pauses the chain
//! - Routes are assembled before the server starts and never change afterwards

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use hyper::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::format::Format;
use crate::http::middleware::{BoxMiddleware, Continuation, Middleware, Next};
use crate::http::{Request, Response};
use crate::routing::matcher::{get, put};

/// Ordered composition of middleware.
#[derive(Clone, Default)]
pub struct Chain {
    links: Vec<BoxMiddleware>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, middleware: impl Middleware) -> Self {
        self.links.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl Extend<BoxMiddleware> for Chain {
    fn extend<I: IntoIterator<Item = BoxMiddleware>>(&mut self, iter: I) {
        self.links.extend(iter);
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("links", &self.links.len()).finish()
    }
}

impl Middleware for Chain {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            for (index, link) in self.links.iter().enumerate() {
                let step = Continuation::new();
                link.call(request, response, step.next()).await;

                if response.is_started() {
                    next.run();
                    return;
                }
                if !step.was_called() {
                    tracing::debug!(index, "Middleware chain paused");
                    return;
                }
            }
            next.run();
        })
    }
}

/// Terminal answering `404 Not Found` with the reason phrase as body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl Middleware for NotFound {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        tracing::debug!(method = %request.method(), uri = %request.uri(), "No route matched");
        response.send_reason(StatusCode::NOT_FOUND);
        next.run();
        Box::pin(async {})
    }
}

/// Continue with `next` if `response` was started, otherwise run the not-found handler.
async fn finish<'a>(
    not_found: &'a dyn Middleware,
    request: &'a Request,
    response: &'a mut Response,
    next: Next<'a>,
) {
    if response.is_started() {
        next.run();
    } else {
        not_found.call(request, response, next).await;
    }
}

/// A chain of routes with a not-found terminal.
#[derive(Clone)]
pub struct Router {
    chain: Chain,
    not_found: BoxMiddleware,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            chain: Chain::new(),
            not_found: Arc::new(NotFound),
        }
    }

    pub fn route(mut self, middleware: impl Middleware) -> Self {
        self.chain = self.chain.link(middleware);
        self
    }

    /// Append every route of `service`, keeping their order.
    pub fn service(mut self, service: Service) -> Self {
        tracing::debug!(service = %service.name, routes = service.routes.len(), "Service mounted");
        self.chain.extend(service.routes);
        self
    }

    /// Replace the default `404 Not Found` terminal.
    pub fn not_found(mut self, middleware: impl Middleware) -> Self {
        self.not_found = Arc::new(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.len()).finish()
    }
}

impl Middleware for Router {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let exhausted = Continuation::new();
            self.chain.call(request, response, exhausted.next()).await;
            if exhausted.was_called() {
                finish(&*self.not_found, request, response, next).await;
            }
        })
    }
}

/// Compose services into one router, in the order given.
pub fn router(services: impl IntoIterator<Item = Service>) -> Router {
    services.into_iter().fold(Router::new(), Router::service)
}

/// Router that picks one middleware per request through a closure.
pub struct Lookup<F> {
    route: F,
    not_found: BoxMiddleware,
}

pub fn lookup<F>(route: F) -> Lookup<F>
where
    F: Fn(&Request) -> Option<BoxMiddleware> + Send + Sync + 'static,
{
    Lookup {
        route,
        not_found: Arc::new(NotFound),
    }
}

impl<F> Lookup<F> {
    pub fn not_found(mut self, middleware: impl Middleware) -> Self {
        self.not_found = Arc::new(middleware);
        self
    }
}

impl<F> Middleware for Lookup<F>
where
    F: Fn(&Request) -> Option<BoxMiddleware> + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(middleware) = (self.route)(request) else {
                self.not_found.call(request, response, next).await;
                return;
            };
            let done = Continuation::new();
            middleware.call(request, response, done.next()).await;
            if done.was_called() {
                finish(&*self.not_found, request, response, next).await;
            }
        })
    }
}

/// A named, ordered group of routes.
#[derive(Clone)]
pub struct Service {
    name: String,
    routes: Vec<BoxMiddleware>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn routes(&self) -> &[BoxMiddleware] {
        &self.routes
    }

    pub fn route(mut self, middleware: impl Middleware) -> Self {
        self.routes.push(Arc::new(middleware));
        self
    }

    /// `GET` route answering with the JSON of `accessor(captures)`.
    pub fn get_json<A, T, G>(self, format: Format<A>, accessor: G) -> Self
    where
        A: 'static,
        T: Serialize + 'static,
        G: Fn(A) -> T + Send + Sync + 'static,
    {
        self.route(get(
            format,
            move |captures: A, _: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                res.send_json(StatusCode::OK, &accessor(captures))?;
                next.run();
                Ok(())
            },
        ))
    }

    /// `GET` and `PUT` routes bound to a value.
    ///
    /// `GET` answers with the JSON of `getter()`. `PUT` decodes the JSON body, hands it to
    /// `setter` and answers with the new value, or `400 Bad Request` if the body does not
    /// decode.
    pub fn bind<A, T, G, S>(self, format: Format<A>, getter: G, setter: S) -> Self
    where
        A: 'static,
        T: Serialize + DeserializeOwned + 'static,
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        let getter = Arc::new(getter);
        let read = Arc::clone(&getter);
        self.route(get(
            format.clone(),
            move |_: A, _: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                res.send_json(StatusCode::OK, &read())?;
                next.run();
                Ok(())
            },
        ))
        .route(put(
            format,
            move |_: A, req: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                let body = req.body().cloned().unwrap_or_default();
                match serde_json::from_slice::<T>(&body) {
                    Ok(value) => {
                        setter(value);
                        res.send_json(StatusCode::OK, &getter())?;
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "Rejected bound value");
                        res.send_reason(StatusCode::BAD_REQUEST);
                    }
                }
                next.run();
                Ok(())
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::root;
    use crate::http::middleware::{dispatch, from_fn};
    use crate::routing::matcher::post;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn text(body: &'static str) -> impl Middleware {
        from_fn(move |_: &Request, res: &mut Response, next: Next<'_>| {
            res.send_string(StatusCode::OK, body);
            next.run();
        })
    }

    fn body(response: &Response) -> &str {
        std::str::from_utf8(response.body().unwrap()).unwrap()
    }

    async fn send(middleware: &impl Middleware, target: &str) -> Response {
        let request = Request::get(target).build().unwrap();
        dispatch(middleware, &request).await.unwrap()
    }

    #[tokio::test]
    async fn empty_router_answers_not_found() {
        let response = send(&router([]), "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response), "Not Found");
    }

    #[tokio::test]
    async fn first_match_wins() {
        let app = Router::new()
            .route(get(
                root().path("a"),
                |(), _: &Request, res: &mut Response, next: Next<'_>| {
                    res.send_string(StatusCode::OK, "first");
                    next.run();
                },
            ))
            .route(get(
                root().path("a"),
                |(), _: &Request, res: &mut Response, next: Next<'_>| {
                    res.send_string(StatusCode::OK, "second");
                    next.run();
                },
            ));
        assert_eq!(body(&send(&app, "/a").await), "first");
    }

    #[tokio::test]
    async fn unmatched_requests_fall_through_to_not_found() {
        let app = Router::new().route(get(
            root().path("a").end(),
            |(), _: &Request, res: &mut Response, next: Next<'_>| {
                res.send_string(StatusCode::OK, "a");
                next.run();
            },
        ));
        assert_eq!(send(&app, "/b").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(&app, "/a/b").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn started_response_stops_the_chain() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later_calls);
        let app = Router::new().route(text("kept")).route(from_fn(
            move |_: &Request, res: &mut Response, next: Next<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                res.send_string(StatusCode::IM_A_TEAPOT, "overwritten");
                next.run();
            },
        ));
        let response = send(&app, "/").await;
        assert_eq!(body(&response), "kept");
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn header_only_middleware_does_not_stop_the_chain() {
        let app = Router::new()
            .route(from_fn(|_: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                res.set_header("x-trace", "on")?;
                next.run();
                Ok(())
            }))
            .route(text("handled"));
        let response = send(&app, "/").await;
        assert_eq!(response.headers()["x-trace"], "on");
        assert_eq!(body(&response), "handled");
    }

    #[tokio::test]
    async fn paused_chain_runs_nothing_further() {
        let app = Router::new()
            .route(from_fn(|_: &Request, _: &mut Response, _: Next<'_>| {}))
            .route(text("unreachable"));
        let request = Request::get("/").build().unwrap();
        assert!(matches!(
            dispatch(&app, &request).await,
            Err(crate::Error::Abandoned)
        ));
    }

    #[tokio::test]
    async fn services_keep_cross_service_order() {
        let hello = Service::new("hello").route(get(
            root().path("hello").string().end(),
            |(name,): (String,), _: &Request, res: &mut Response, next: Next<'_>| -> Result<()> {
                res.send_json(StatusCode::OK, &format!("Hello, {name}!"))?;
                next.run();
                Ok(())
            },
        ));
        let shadowed = Service::new("shadowed").route(get(
            root().path("hello").string().end(),
            |_: (String,), _: &Request, res: &mut Response, next: Next<'_>| {
                res.send_string(StatusCode::OK, "shadowed");
                next.run();
            },
        ));
        let echo = Service::new("echo").route(post(
            root().path("echo").end(),
            |(), req: &Request, res: &mut Response, next: Next<'_>| {
                let body = req.body().cloned().unwrap_or_default();
                res.send_string(StatusCode::OK, String::from_utf8_lossy(&body));
                next.run();
            },
        ));

        let app = router([hello, shadowed, echo]);
        assert_eq!(app.len(), 3);
        assert_eq!(body(&send(&app, "/hello/world").await), "\"Hello, world!\"");

        let request = Request::post("/echo").body("ping").build().unwrap();
        let response = dispatch(&app, &request).await.unwrap();
        assert_eq!(body(&response), "ping");

        assert_eq!(send(&app, "/hello").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_not_found() {
        let app = Router::new().not_found(from_fn(
            |_: &Request, res: &mut Response, next: Next<'_>| {
                res.send_string(StatusCode::GONE, "gone");
                next.run();
            },
        ));
        let response = send(&app, "/anything").await;
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn lookup_router_dispatches_by_closure() {
        let app = lookup(|request: &Request| -> Option<BoxMiddleware> {
            (request.uri().path() == "/helloworld")
                .then(|| Arc::new(text("Hello world!")) as BoxMiddleware)
        });
        assert_eq!(body(&send(&app, "/helloworld").await), "Hello world!");

        let missing = send(&app, "/").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&missing), "Not Found");
    }

    #[tokio::test]
    async fn bound_values_read_and_write() {
        let store = Arc::new(Mutex::new(vec!["a".to_string()]));
        let (reader, writer) = (Arc::clone(&store), Arc::clone(&store));
        let app = router([Service::new("items").bind(
            root().path("items").end(),
            move || reader.lock().unwrap().clone(),
            move |items: Vec<String>| *writer.lock().unwrap() = items,
        )]);

        assert_eq!(body(&send(&app, "/items").await), r#"["a"]"#);

        let update = Request::builder()
            .method(hyper::Method::PUT)
            .uri("/items")
            .body(r#"["b","c"]"#)
            .build()
            .unwrap();
        let response = dispatch(&app, &update).await.unwrap();
        assert_eq!(body(&response), r#"["b","c"]"#);
        assert_eq!(*store.lock().unwrap(), ["b", "c"]);

        let invalid = Request::builder()
            .method(hyper::Method::PUT)
            .uri("/items")
            .body("nope")
            .build()
            .unwrap();
        let response = dispatch(&app, &invalid).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_json_uses_captures() {
        let app = router([Service::new("users").get_json(
            root().path("users").int().end(),
            |(id,): (i64,)| serde_json::json!({ "id": id }),
        )]);
        assert_eq!(body(&send(&app, "/users/7").await), r#"{"id":7}"#);
    }
}
