//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, one exchange per connection)
//!     → request.rs (assembled request, request ID, pre-split URL)
//!     → middleware (routes, routers, redirect, delay)
//!     → response.rs (status, headers, body, started flag)
//!     → Send to client, close
//! ```

pub mod client;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{Request, RequestBuilder, RequestHead, RequestId, X_REQUEST_ID};
pub use response::{Response, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use server::MockServer;
