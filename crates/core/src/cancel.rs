//! Cancellation handles for in-flight remote calls.
//!
//! A handle is a `watch` channel flipped from `false` to `true` exactly once.
//! The workflow keeps one handle for the lifetime of the surface; each remote
//! call additionally gets its own handle so the transport can abort it.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Flip the handle. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of a [`CancellationHandle`], handed to remote calls.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle is cancelled. Never resolves otherwise.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without cancelling: nothing can cancel us any more.
            std::future::pending::<()>().await;
        }
    }
}
