//! Artificial latency in front of another middleware.

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::http::middleware::{Middleware, Next};
use crate::http::{Request, Response};

/// Waits for a fixed duration, then hands the exchange to `inner`.
#[derive(Debug)]
pub struct Delay<M> {
    duration: Duration,
    inner: M,
}

pub fn delay<M: Middleware>(duration: Duration, inner: M) -> Delay<M> {
    Delay { duration, inner }
}

impl<M> Delay<M> {
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<M: Middleware> Middleware for Delay<M> {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.duration).await;
            self.inner.call(request, response, next).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{dispatch, from_fn};
    use hyper::StatusCode;
    use std::time::Instant;

    #[tokio::test]
    async fn waits_before_running_inner() {
        let slow = delay(
            Duration::from_millis(50),
            from_fn(|_: &Request, res: &mut Response, next: Next<'_>| {
                res.send_string(StatusCode::OK, "late");
                next.run();
            }),
        );
        assert_eq!(slow.duration(), Duration::from_millis(50));

        let started = Instant::now();
        let request = Request::get("/").build().unwrap();
        let response = dispatch(&slow, &request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(response.body().unwrap().as_ref(), b"late");
    }
}
