//! Async backend: bridges the TUI event loop with chat service calls.
//!
//! Uses an mpsc channel pair. A screen sends its command values, and a
//! background tokio task executes each one against the session's service
//! and sends the screen's response values back. Live subscriptions are
//! forwarded onto the same response channel.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::sdk::{ChatService, Subscription};

/// Executes one command against the service.
pub type Handler<C, R> = fn(Arc<dyn ChatService>, C) -> BoxFuture<'static, R>;

/// Handle for interacting with the backend from the TUI side.
pub struct Backend<C, R> {
    cmd_tx: mpsc::UnboundedSender<C>,
    resp_tx: mpsc::UnboundedSender<R>,
    resp_rx: mpsc::UnboundedReceiver<R>,
    worker: JoinHandle<()>,
}

impl<C, R> Backend<C, R>
where
    C: Send + 'static,
    R: Send + 'static,
{
    /// Start the backend. Spawns a tokio task that processes commands.
    pub fn start(service: Arc<dyn ChatService>, handler: Handler<C, R>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(backend_loop(service, handler, cmd_rx, resp_tx.clone()));

        Self {
            cmd_tx,
            resp_tx,
            resp_rx,
            worker,
        }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: C) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Deliver every item of `subscription` as a response, until the
    /// returned handle is dropped.
    pub fn forward<T, F>(&self, mut subscription: Subscription<T>, wrap: F) -> Forward
    where
        T: Send + 'static,
        F: Fn(T) -> R + Send + 'static,
    {
        let resp_tx = self.resp_tx.clone();
        Forward(tokio::spawn(async move {
            while let Some(item) = subscription.recv().await {
                if resp_tx.send(wrap(item)).is_err() {
                    break;
                }
            }
        }))
    }

    /// Receive a response from the backend.
    ///
    /// Suspends until a response is available. Designed to be used inside
    /// `tokio::select!`.
    pub async fn recv(&mut self) -> Option<R> {
        self.resp_rx.recv().await
    }

    /// Drain responses that are already queued.
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<R> {
        self.resp_rx.try_recv().ok()
    }
}

impl<C, R> Drop for Backend<C, R> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// A running subscription forward. Dropping it stops the forward and
/// releases the subscription.
pub struct Forward(JoinHandle<()>);

impl Drop for Forward {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Background loop that processes commands.
async fn backend_loop<C, R>(
    service: Arc<dyn ChatService>,
    handler: Handler<C, R>,
    mut cmd_rx: mpsc::UnboundedReceiver<C>,
    resp_tx: mpsc::UnboundedSender<R>,
) where
    C: Send + 'static,
    R: Send + 'static,
{
    while let Some(cmd) = cmd_rx.recv().await {
        let service = Arc::clone(&service);
        let resp_tx = resp_tx.clone();

        // Spawn each command as a separate task so we don't block the loop.
        tokio::spawn(async move {
            let response = handler(service, cmd).await;
            let _ = resp_tx.send(response);
        });
    }
}
