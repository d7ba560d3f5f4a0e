//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use hyper::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use stubserve::http::middleware::{from_fn, Middleware, Next};
use stubserve::http::{Request, Response};
use stubserve::{MockServer, ServerConfig};

/// Non-pooled client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn test_config(port: u16) -> ServerConfig {
    ServerConfig {
        worker_threads: 2,
        stop_timeout_ms: 2000,
        ..ServerConfig::with_port(port)
    }
}

/// Start `middleware` on an ephemeral port.
pub fn start_server(middleware: impl Middleware) -> MockServer {
    let mut server = MockServer::new(test_config(0), middleware);
    server.start().unwrap();
    server
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Upstream that answers every request with a JSON description of it.
///
/// ```json
/// {"method": "POST", "url": "http://host/post?query=value", "data": "...", "headers": {...}}
/// ```
pub fn start_echo_upstream() -> MockServer {
    start_server(from_fn(
        |req: &Request, res: &mut Response, next: Next<'_>| -> stubserve::Result<()> {
            let headers: BTreeMap<&str, &str> = req
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
                .collect();
            let host = headers.get("host").copied().unwrap_or_default();
            let echo = serde_json::json!({
                "method": req.method().as_str(),
                "url": format!("http://{host}{}", req.uri()),
                "data": String::from_utf8_lossy(req.body().map(|b| &b[..]).unwrap_or_default()),
                "headers": headers,
            });
            res.send_json(StatusCode::OK, &echo)?;
            res.set_header("content-encoding", "identity")?;
            next.run();
            Ok(())
        },
    ))
}

/// Raw TCP backend that reads one request, writes a fixed `200 OK` and closes.
pub async fn start_fixed_backend(response: &'static str) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}
