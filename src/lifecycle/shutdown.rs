//! Shutdown coordination between a server handle and its accept loop.

use std::sync::mpsc;
use std::time::Duration;

use tokio::sync::broadcast;

/// Broadcasts a stop request to the tasks of one server run.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening for the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Sent by the accept loop once its listener is closed.
#[derive(Debug)]
pub struct Stopped {
    tx: mpsc::Sender<()>,
}

/// Waited on by the server handle.
#[derive(Debug)]
pub struct StoppedWaiter {
    rx: mpsc::Receiver<()>,
}

pub fn stopped_channel() -> (Stopped, StoppedWaiter) {
    let (tx, rx) = mpsc::channel();
    (Stopped { tx }, StoppedWaiter { rx })
}

impl Stopped {
    pub fn notify(self) {
        let _ = self.tx.send(());
    }
}

impl StoppedWaiter {
    /// Block until the accept loop acknowledges, or `timeout` elapses.
    ///
    /// A dropped sender counts as acknowledged: the loop is gone either way.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(
            self.rx.recv_timeout(timeout),
            Err(mpsc::RecvTimeoutError::Timeout)
        )
    }
}
