//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! MockServer::start
//!     → build worker runtime → bind listener → spawn accept loop
//!
//! MockServer::stop (shutdown.rs):
//!     trigger → accept loop drops the listener → acknowledges → runtime shut down
//!
//! Binary (signals.rs):
//!     SIGINT/SIGTERM → stop the server → exit
//! ```
//!
//! # Design Decisions
//! - Stop returns only after the listening socket is released, so a restart on the
//!   same port succeeds immediately
//! - In-flight connections are dropped with the runtime rather than drained

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
