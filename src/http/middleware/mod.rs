//! Middleware contract.
//!
//! # Responsibilities
//! - Define the [`Middleware`] trait every route, router and wrapper implements
//! - Provide the [`Next`] continuation token and its owning [`Continuation`]
//! - Run a middleware against a request in-process ([`dispatch`])
//!
//! # Design Decisions
//! - A middleware receives `(&Request, &mut Response, Next)` and returns a boxed future
//! - Calling [`Next::run`] means "I did not fully handle this request"
//! - Not calling it means the middleware completed the exchange itself, or gave up
//! - Waiting (timers, upstream calls) happens inside the future, never on the thread

pub mod delay;
pub mod redirect;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::error::{Error, Result};
use crate::http::{Request, Response};

pub use delay::{delay, Delay};
pub use redirect::{redirect, Redirect};

/// A composable request handler.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        (**self).call(request, response, next)
    }
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        (**self).call(request, response, next)
    }
}

/// Shared, type-erased middleware.
pub type BoxMiddleware = Arc<dyn Middleware>;

/// Continuation handed to a middleware.
#[derive(Debug)]
pub struct Next<'a> {
    continued: &'a AtomicBool,
}

impl Next<'_> {
    /// Hand the exchange on to whatever follows this middleware.
    pub fn run(self) {
        self.continued.store(true, Ordering::Release);
    }
}

/// Owner of a continuation flag; issues [`Next`] tokens and reports whether one ran.
#[derive(Debug, Default)]
pub struct Continuation {
    continued: AtomicBool,
}

impl Continuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Next<'_> {
        Next {
            continued: &self.continued,
        }
    }

    pub fn was_called(&self) -> bool {
        self.continued.load(Ordering::Acquire)
    }
}

/// What a handler closure may return.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<()>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<()> {
        Ok(())
    }
}

impl<E: Into<Error>> IntoOutcome for std::result::Result<(), E> {
    fn into_outcome(self) -> Result<()> {
        self.map_err(Into::into)
    }
}

/// Middleware built from a synchronous closure.
pub struct FromFn<F> {
    f: F,
}

/// Wrap a closure `(request, response, next)` as a middleware.
///
/// An `Err` returned by the closure marks the response failed.
pub fn from_fn<F, R>(f: F) -> FromFn<F>
where
    F: Fn(&Request, &mut Response, Next<'_>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    FromFn { f }
}

impl<F, R> Middleware for FromFn<F>
where
    F: Fn(&Request, &mut Response, Next<'_>) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        if let Err(err) = (self.f)(request, response, next).into_outcome() {
            response.fail(err);
        }
        future::ready(()).boxed()
    }
}

/// A middleware that only hands the exchange on.
///
/// Served on its own it answers every request with an empty `200 OK`.
pub fn pass() -> FromFn<impl Fn(&Request, &mut Response, Next<'_>) + Send + Sync + 'static> {
    from_fn(|_: &Request, _: &mut Response, next: Next<'_>| next.run())
}

/// Run `middleware` against `request` and collect the response.
///
/// The exchange is complete when the middleware called its continuation or started the
/// response. Otherwise it was abandoned and [`Error::Abandoned`] is returned. A failure
/// recorded by a handler is returned as that error.
pub async fn dispatch<M>(middleware: &M, request: &Request) -> Result<Response>
where
    M: Middleware + ?Sized,
{
    let mut response = Response::new();
    let continuation = Continuation::new();
    middleware
        .call(request, &mut response, continuation.next())
        .await;

    if let Some(err) = response.take_failure() {
        return Err(err);
    }
    if continuation.was_called() || response.is_started() {
        Ok(response)
    } else {
        Err(Error::Abandoned)
    }
}
