//! In-process event bus.
//!
//! Instrumented operations are published as [`Event`]s under a topic name;
//! collectors attach callbacks with [`EventBus::subscribe`] and receive
//! every event published under that topic, synchronously, on the publishing
//! thread. The returned [`Subscription`] handle is the only way to detach a
//! callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A single instrumented operation.
///
/// External event data is adapted into this fixed shape at the boundary;
/// nothing downstream inspects anything beyond these two fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event sub-type, e.g. `"Item Load"`, `"CACHE"`, `"SCHEMA"`.
    pub category: String,
    /// The operation text, e.g. the SQL statement.
    pub payload: String,
}

impl Event {
    /// Create an event from its category and payload.
    pub fn new(category: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            payload: payload.into(),
        }
    }
}

/// Callback signature accepted by the bus.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle for one live callback registration.
///
/// Owned exclusively by the subscriber; pass it back to
/// [`EventBus::unsubscribe`] to detach.
#[derive(Debug)]
#[must_use = "dropping the handle without unsubscribing leaks a live callback registration"]
pub struct Subscription {
    id: u64,
    topic: String,
}

/// Topic-keyed publish/subscribe facility.
///
/// Publishing is synchronous: every callback registered under the topic is
/// invoked in subscription order on the calling thread. Callbacks run
/// outside the internal lock, so a callback may itself subscribe or
/// unsubscribe without deadlocking.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<(u64, Callback)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a callback under a topic.
    pub fn subscribe(&self, topic: &str, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push((id, callback));

        tracing::debug!(topic, id, "Callback subscribed");
        Subscription {
            id,
            topic: topic.to_string(),
        }
    }

    /// Detach a previously registered callback.
    ///
    /// A handle whose registration is already gone is a no-op.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entries) = subscribers.get_mut(&subscription.topic) {
            entries.retain(|(id, _)| *id != subscription.id);
            if entries.is_empty() {
                subscribers.remove(&subscription.topic);
            }
        }
        tracing::debug!(topic = %subscription.topic, id = subscription.id, "Callback unsubscribed");
    }

    /// Publish an event to every callback registered under `topic`.
    pub fn publish(&self, topic: &str, event: &Event) {
        // Snapshot the callbacks so they run without holding the lock.
        let callbacks: Vec<Callback> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match subscribers.get(topic) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of callbacks currently registered under `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self
            .subscribers
            .try_read()
            .map(|s| s.len())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("topic_count", &topics)
            .finish_non_exhaustive()
    }
}
