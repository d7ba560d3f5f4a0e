//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (identity, tracking, exchange state machine)
//!     → Hand off to HTTP layer
//!
//! Exchange States:
//!     Idle → ReceivingRequest → SendingResponse → Idle
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so the server can report live connections

pub mod connection;
pub mod listener;
