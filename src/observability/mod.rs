//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! listener, server, router, redirect
//!     → tracing events with structured fields
//!     → `exchange` span per request (request_id, method, uri)
//!     → logging.rs subscriber (stdout)
//! ```

pub mod logging;
