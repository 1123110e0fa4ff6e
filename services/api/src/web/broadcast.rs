//! services/api/src/web/broadcast.rs
//!
//! Fan-out of live events to every connected subscriber of this server
//! instance. Created once at startup, owned by `AppState`, drained on shutdown.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::web::protocol::LiveEvent;

/// A registered subscriber. The receiver yields `None` once the subscriber is
/// removed or the broadcaster shuts down.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<LiveEvent>,
}

#[derive(Default)]
struct Inner {
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<LiveEvent>>,
    closed: bool,
}

#[derive(Default)]
pub struct Broadcaster {
    inner: Mutex<Inner>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber. After shutdown the returned receiver is already closed.
    pub async fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        if !inner.closed {
            inner.subscribers.insert(id, sender);
        }
        Subscription { id, receiver }
    }

    /// Removes a subscriber, closing its receiver. Returns whether it was registered.
    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        self.inner.lock().await.subscribers.remove(&id).is_some()
    }

    /// Sends `event` to every live subscriber and returns how many received it.
    /// Subscribers whose receiver was dropped are pruned.
    pub async fn publish(&self, event: LiveEvent) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        let delivered = inner.subscribers.len();
        if delivered < before {
            tracing::debug!(pruned = before - delivered, "dropped closed live subscribers");
        }
        delivered
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Closes every subscriber and refuses new ones.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        let drained = inner.subscribers.len();
        inner.subscribers.clear();
        tracing::info!(drained, "live broadcaster shut down");
    }
}
