//! In-process publish/subscribe with named topics.
//!
//! Delivery is synchronous: subscribers run in the publisher's thread and
//! side effects are visible before `publish` returns. Handler failures and
//! panics are caught and logged — they never propagate to the publisher.
//! The subscriber lock serializes list mutation only, not delivery.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// One published event. `data` is an open payload; the bus does not
/// interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub source: String,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data,
            source: String::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    topic: String,
    handler: Handler,
}

/// Topic-keyed synchronous event bus. At-least-once delivery within the
/// process; no persistence.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let topic = topic.into();
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        subscribers.push(Subscriber {
            id,
            topic,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver to every subscriber of the event's topic, in subscription
    /// order, in the calling thread. Returns the delivery count.
    pub fn publish(&self, event: &Event) -> usize {
        // Snapshot handlers so delivery runs outside the subscriber lock.
        let handlers: Vec<Handler> = {
            let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
            subscribers
                .iter()
                .filter(|s| s.topic == event.event_type)
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        debug!(topic = %event.event_type, count = handlers.len(), "publishing event");
        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    // Swallow-and-log: a failing subscriber never breaks the
                    // publisher or the remaining subscribers.
                    error!(topic = %event.event_type, error = %err, "event handler failed");
                }
                Err(_) => {
                    error!(topic = %event.event_type, "event handler panicked");
                }
            }
        }
        delivered
    }

    /// Subscriber counts per topic, for introspection.
    pub fn get_subscribers(&self) -> HashMap<String, usize> {
        let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        let mut counts: HashMap<String, usize> = HashMap::new();
        for s in subscribers.iter() {
            *counts.entry(s.topic.clone()).or_default() += 1;
        }
        counts
    }

    /// Drop every subscription. For tests.
    pub fn clear(&self) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_delivery_is_synchronous() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_handler = Arc::clone(&seen);
        bus.subscribe("guest_checked_out", move |event| {
            assert_eq!(event.data["room_id"], 101);
            seen_in_handler.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivered = bus.publish(&Event::new("guest_checked_out", json!({"room_id": 101})));

        // Visible before publish returns.
        assert_eq!(delivered, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_topic_isolation() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_handler = Arc::clone(&count);
        bus.subscribe("topic_a", move |_| {
            count_in_handler.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&Event::new("topic_b", json!({})));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("t", |_| anyhow::bail!("boom"));
        let count_in_handler = Arc::clone(&count);
        bus.subscribe("t", move |_| {
            count_in_handler.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivered = bus.publish(&Event::new("t", json!({})));
        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let bus = EventBus::new();
        bus.subscribe("t", |_| panic!("handler bug"));
        let delivered = bus.publish(&Event::new("t", json!({})));
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe("t", |_| Ok(()));
        assert_eq!(bus.get_subscribers().get("t"), Some(&1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.get_subscribers().is_empty());
    }

    #[test]
    fn test_delivery_order_follows_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe("t", move |_| {
                order.lock().unwrap().push(tag);
                Ok(())
            });
        }
        bus.publish(&Event::new("t", json!({})));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }
}
