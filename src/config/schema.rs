//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every section has
//! defaults so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for a mock server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MockConfig {
    pub server: ServerConfig,

    pub logging: LoggingConfig,

    /// Canned responses, matched in declaration order.
    pub stubs: Vec<StubConfig>,

    /// Requests forwarded to a real upstream, tried after every stub.
    pub redirects: Vec<RedirectConfig>,
}

/// Listener and worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// Worker threads; 0 uses the available parallelism.
    pub worker_threads: usize,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long `stop` waits for the listener to close.
    pub stop_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            worker_threads: 0,
            max_connections: 1024,
            stop_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Config for `127.0.0.1:<port>` with every other field defaulted.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the crate when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A canned response for requests matching `method` and `path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StubConfig {
    pub name: String,

    pub method: String,

    /// Path template, e.g. `/users/:Int?sort=:String`.
    pub path: String,

    /// Require the whole path to match rather than a prefix.
    pub exact: bool,

    pub status: u16,

    /// Plain text body, sent as `text/html; charset=utf-8`.
    pub body: Option<String>,

    /// JSON body, sent as `application/json; charset=utf-8`.
    pub json: Option<serde_json::Value>,

    pub headers: BTreeMap<String, String>,

    pub delay_ms: u64,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            method: "GET".to_string(),
            path: "/".to_string(),
            exact: true,
            status: 200,
            body: None,
            json: None,
            headers: BTreeMap::new(),
            delay_ms: 0,
        }
    }
}

/// Forward matching requests to `upstream`, keeping their path and query.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub name: String,

    /// Only forward this method; any method when unset.
    pub method: Option<String>,

    /// Path prefix template.
    pub path: String,

    /// Base URL, e.g. `http://127.0.0.1:9000`.
    pub upstream: String,

    /// Headers added to the forwarded request.
    pub headers: BTreeMap<String, String>,

    pub delay_ms: u64,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            method: None,
            path: "/".to_string(),
            upstream: String::new(),
            headers: BTreeMap::new(),
            delay_ms: 0,
        }
    }
}
