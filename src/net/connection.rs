//! Connection identity, lifecycle tracking and the exchange state machine.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections so the server can report them
//! - Drive one request/response exchange through its states
//!
//! # Design Decisions
//! - One exchange per connection; the connection closes after the response
//! - Out-of-order events are a [`StateViolation`], fatal for that connection only
//! - The body buffer is allocated lazily on the first chunk

use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::http::RequestHead;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a request came from. Carried by every [`Request`](crate::http::Request).
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    id: ConnectionId,
    peer: Option<SocketAddr>,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, peer: Option<SocketAddr>) -> Self {
        Self { id, peer }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Counts active connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Observable phase of an [`Exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ReceivingRequest,
    SendingResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::ReceivingRequest => "receiving request",
            Phase::SendingResponse => "sending response",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{event} is not allowed while {phase}")]
pub struct StateViolation {
    pub event: &'static str,
    pub phase: Phase,
}

#[derive(Debug)]
enum State {
    Idle,
    ReceivingRequest {
        head: RequestHead,
        body: Option<BytesMut>,
    },
    SendingResponse,
}

/// State machine for one request/response exchange.
///
/// ```text
/// Idle --request_received--> ReceivingRequest --body_received--> ReceivingRequest
///      ReceivingRequest --request_complete--> SendingResponse
///      SendingResponse --response_complete--> Idle
/// ```
#[derive(Debug)]
pub struct Exchange {
    state: State,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::ReceivingRequest { .. } => Phase::ReceivingRequest,
            State::SendingResponse => Phase::SendingResponse,
        }
    }

    fn violation(&self, event: &'static str) -> StateViolation {
        StateViolation {
            event,
            phase: self.phase(),
        }
    }

    pub fn request_received(&mut self, head: RequestHead) -> Result<(), StateViolation> {
        match self.state {
            State::Idle => {
                self.state = State::ReceivingRequest { head, body: None };
                Ok(())
            }
            _ => Err(self.violation("request head")),
        }
    }

    pub fn body_received(&mut self, chunk: &[u8]) -> Result<(), StateViolation> {
        match &mut self.state {
            State::ReceivingRequest { body, .. } => {
                body.get_or_insert_with(BytesMut::new).extend_from_slice(chunk);
                Ok(())
            }
            _ => Err(self.violation("request body")),
        }
    }

    /// Freeze the request; the exchange now waits for its response.
    pub fn request_complete(&mut self) -> Result<(RequestHead, Option<Bytes>), StateViolation> {
        match mem::replace(&mut self.state, State::SendingResponse) {
            State::ReceivingRequest { head, body } => Ok((head, body.map(BytesMut::freeze))),
            previous => {
                self.state = previous;
                Err(self.violation("request end"))
            }
        }
    }

    pub fn response_complete(&mut self) -> Result<(), StateViolation> {
        match self.state {
            State::SendingResponse => {
                self.state = State::Idle;
                Ok(())
            }
            _ => Err(self.violation("response end")),
        }
    }
}
