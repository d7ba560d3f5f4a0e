//! Mock HTTP server.
//!
//! # Responsibilities
//! - Own a dedicated Tokio runtime for the lifetime of one run
//! - Accept connections and serve one exchange per connection over HTTP/1.1
//! - Feed each exchange through the middleware and write the result
//! - Release the listening socket synchronously on `stop`
//!
//! # Design Decisions
//! - `start`/`stop` are blocking so callers need not be async; tests drive the
//!   server from plain threads or from inside their own runtime
//! - A failed or abandoned exchange closes the connection without a response
//! - The middleware is built once and shared by every connection through an `Arc`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::http::middleware::{dispatch, pass, BoxMiddleware, Middleware};
use crate::http::{Request, X_REQUEST_ID};
use crate::lifecycle::shutdown::{stopped_channel, Stopped, StoppedWaiter};
use crate::lifecycle::Shutdown;
use crate::net::connection::{ConnectionContext, ConnectionGuard, ConnectionTracker, Exchange};
use crate::net::listener::{Listener, ListenerError};

/// A start/stop-able HTTP server answering with a middleware.
pub struct MockServer {
    config: ServerConfig,
    middleware: BoxMiddleware,
    tracker: ConnectionTracker,
    running: Option<Running>,
}

/// State of one `start`..`stop` run.
struct Running {
    runtime: Runtime,
    local_addr: SocketAddr,
    shutdown: Shutdown,
    stopped: StoppedWaiter,
}

impl MockServer {
    pub fn new(config: ServerConfig, middleware: impl Middleware) -> Self {
        Self {
            config,
            middleware: Arc::new(middleware),
            tracker: ConnectionTracker::new(),
            running: None,
        }
    }

    /// Server on `127.0.0.1:<port>` that answers every request with an empty `200 OK`.
    pub fn with_port(port: u16) -> Self {
        Self::new(ServerConfig::with_port(port), pass())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and begin accepting connections.
    ///
    /// Returns the bound address, which carries the real port when the configured port is 0.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Err(Error::AlreadyRunning(running.local_addr));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads())
            .thread_name("stubserve-worker")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        let listener = {
            let _enter = runtime.enter();
            Listener::bind(&self.config)
        };
        let listener = match listener {
            Ok(listener) => listener,
            Err(err) => {
                runtime.shutdown_background();
                return Err(err.into());
            }
        };
        let local_addr = listener.local_addr();

        let shutdown = Shutdown::new();
        let (stopped, waiter) = stopped_channel();
        runtime.spawn(accept_loop(
            listener,
            Arc::clone(&self.middleware),
            self.tracker.clone(),
            shutdown.subscribe(),
            stopped,
        ));

        tracing::info!(
            address = %local_addr,
            worker_threads = self.config.worker_threads(),
            "Mock server started"
        );

        self.running = Some(Running {
            runtime,
            local_addr,
            shutdown,
            stopped: waiter,
        });
        Ok(local_addr)
    }

    /// Stop accepting and release the socket. A no-op when not running.
    pub fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let timeout = Duration::from_millis(self.config.stop_timeout_ms);
        running.shutdown.trigger();
        let acknowledged = running.stopped.wait(timeout);
        running.runtime.shutdown_background();

        if !acknowledged {
            return Err(Error::StopTimeout(timeout));
        }
        tracing::info!(address = %running.local_addr, "Mock server stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Absolute `http://` URL of `path` on the running server.
    pub fn url(&self, path: &str) -> Option<String> {
        let addr = self.local_addr()?;
        let separator = if path.starts_with('/') { "" } else { "/" };
        Some(format!("http://{addr}{separator}{path}"))
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "Mock server did not stop cleanly");
        }
    }
}

async fn accept_loop(
    listener: Listener,
    middleware: BoxMiddleware,
    tracker: ConnectionTracker,
    mut shutdown: broadcast::Receiver<()>,
    stopped: Stopped,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    let middleware = Arc::clone(&middleware);
                    tokio::spawn(async move {
                        serve_connection(stream, peer, guard, middleware).await;
                        drop(permit);
                    });
                }
                Err(ListenerError::Closed) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept connection");
                }
            }
        }
    }

    let address = listener.local_addr();
    drop(listener);
    tracing::debug!(address = %address, "Listener closed");
    stopped.notify();
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    middleware: BoxMiddleware,
) {
    let context = ConnectionContext::new(guard.id(), Some(peer));
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let middleware = Arc::clone(&middleware);
        let context = context.clone();
        async move { exchange(request, context, middleware.as_ref()).await }
    });

    if let Err(err) = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        tracing::debug!(connection_id = %guard.id(), error = %err, "Connection ended with error");
    }
}

/// Assemble one request, run it through the middleware and produce the wire response.
async fn exchange(
    request: hyper::Request<Incoming>,
    context: ConnectionContext,
    middleware: &dyn Middleware,
) -> Result<hyper::Response<Full<Bytes>>> {
    let mut exchange = Exchange::new();
    let (parts, mut body) = request.into_parts();
    exchange.request_received(parts.into())?;
    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(data) = frame.data_ref() {
            exchange.body_received(data)?;
        }
    }

    let (head, body) = exchange.request_complete()?;
    let request = Request::new(head, body, context);
    let span = tracing::info_span!(
        "exchange",
        request_id = %request.id(),
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        let response = match dispatch(middleware, &request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Closing connection without a response");
                return Err(err);
            }
        };
        tracing::debug!(status = %response.status(), "Sending response");

        let mut response = response.into_http();
        if let Ok(value) = HeaderValue::from_str(request.id().as_str()) {
            response.headers_mut().entry(X_REQUEST_ID).or_insert(value);
        }
        exchange.response_complete()?;
        Ok(response)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{from_fn, Next};
    use crate::http::Response;
    use hyper::StatusCode;
    use std::io::{Read, Write};

    fn ephemeral(middleware: impl Middleware) -> MockServer {
        let config = ServerConfig {
            worker_threads: 1,
            ..ServerConfig::with_port(0)
        };
        MockServer::new(config, middleware)
    }

    fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: {addr}\r\n\r\n").unwrap();
        let mut reply = String::new();
        let _ = stream.read_to_string(&mut reply);
        reply
    }

    #[test]
    fn default_handler_answers_empty_ok() {
        let mut server = ephemeral(pass());
        let addr = server.start().unwrap();
        let reply = raw_get(addr, "/anything");
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.contains("x-request-id: "));
        assert!(reply.ends_with("\r\n\r\n"));
        server.stop().unwrap();
    }

    #[test]
    fn double_start_is_rejected_and_restart_works() {
        let mut server = ephemeral(pass());
        let addr = server.start().unwrap();
        assert!(matches!(server.start(), Err(Error::AlreadyRunning(a)) if a == addr));

        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(server.url("/").is_none());
        server.stop().unwrap();

        let addr = server.start().unwrap();
        assert_eq!(server.url("health"), Some(format!("http://{addr}/health")));
        assert!(raw_get(addr, "/").starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn stop_releases_the_port() {
        let mut server = ephemeral(pass());
        let port = server.start().unwrap().port();
        server.stop().unwrap();

        let mut again = MockServer::new(
            ServerConfig {
                worker_threads: 1,
                ..ServerConfig::with_port(port)
            },
            pass(),
        );
        assert_eq!(again.start().unwrap().port(), port);
    }

    #[test]
    fn abandoned_exchange_closes_without_response() {
        let mut server = ephemeral(from_fn(|_: &Request, _: &mut Response, _: Next<'_>| {}));
        let addr = server.start().unwrap();
        assert!(raw_get(addr, "/").is_empty());
    }

    #[test]
    fn started_response_is_sent_without_next() {
        let mut server = ephemeral(from_fn(|_: &Request, res: &mut Response, _: Next<'_>| {
            res.send_string(StatusCode::ACCEPTED, "queued");
        }));
        let addr = server.start().unwrap();
        let reply = raw_get(addr, "/");
        assert!(reply.starts_with("HTTP/1.1 202 Accepted"));
        assert!(reply.ends_with("queued"));
    }
}
