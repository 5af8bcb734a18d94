//! Scoped stream subscriptions.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

/// A live stream from the chat service.
///
/// The listener is deregistered when the subscription is dropped, on every
/// exit path of the owning scope.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Next item, or `None` once the service closed the stream.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next item if one is already queued.
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Stop listening now rather than at end of scope.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Registry of listeners for one stream kind, keyed by listener id.
pub struct Listeners<T> {
    senders: BTreeMap<u64, Listener<T>>,
}

struct Listener<T> {
    user_id: String,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            senders: BTreeMap::new(),
        }
    }
}

impl<T: Clone> Listeners<T> {
    /// Register a listener for `user_id` and return its receiving half.
    pub fn add(&mut self, id: u64, user_id: &str) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(
            id,
            Listener {
                user_id: user_id.to_string(),
                tx,
            },
        );
        rx
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Deliver `item` to every listener, pruning closed ones.
    pub fn emit(&mut self, item: &T) {
        self.senders.retain(|_, l| l.tx.send(item.clone()).is_ok());
    }

    /// Deliver `item` to one listener only (initial snapshots).
    pub fn send_to(&mut self, id: u64, item: &T) {
        let closed = self
            .senders
            .get(&id)
            .is_some_and(|l| l.tx.send(item.clone()).is_err());
        if closed {
            self.senders.remove(&id);
        }
    }

    /// Distinct user ids with a live listener.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.senders.values().map(|l| l.user_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
