//! stubserve: a programmable HTTP mock server.
//!
//! Requests are matched by typed, bidirectional URL [`format`]s and answered by
//! composable [`Middleware`](http::middleware::Middleware): routes, routers, services,
//! redirects to real upstreams and artificial delays. A [`MockServer`] runs the
//! middleware on its own Tokio runtime and can be started and stopped from any thread.
//!
//! ```no_run
//! use hyper::StatusCode;
//! use stubserve::format::root;
//! use stubserve::http::middleware::Next;
//! use stubserve::http::{Request, Response};
//! use stubserve::routing::{get, Router};
//! use stubserve::{MockServer, ServerConfig};
//!
//! let router = Router::new().route(get(
//!     root().path("users").int().end(),
//!     |(id,): (i64,), _: &Request, res: &mut Response, next: Next<'_>| {
//!         res.send_string(StatusCode::OK, format!("user {id}"));
//!         next.run();
//!     },
//! ));
//! let mut server = MockServer::new(ServerConfig::with_port(0), router);
//! let addr = server.start()?;
//! println!("listening on {addr}");
//! server.stop()?;
//! # Ok::<(), stubserve::Error>(())
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{MockConfig, ServerConfig};
pub use error::{Error, Result};
pub use http::MockServer;
pub use lifecycle::Shutdown;
