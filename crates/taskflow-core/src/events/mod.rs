//! In-process publish/subscribe for task lifecycle notifications.
//!
//! Every published event is rendered to a fixed console template, logged at
//! info level under the `taskflow::events` target, then handed to each
//! subscriber in registration order. A failing or panicking subscriber is
//! logged and skipped; it never affects the publisher or other subscribers.

mod kind;
pub mod render;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use serde_json::Value;
use tokio::sync::mpsc;

pub use kind::{Event, EventKind};

/// Log target for rendered events.
pub const EVENT_LOG_TARGET: &str = "taskflow::events";

/// Callback invoked synchronously for each published event.
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out broadcaster owned by one session.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Listeners are called in registration order.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Registers a channel-backed listener for async consumers.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event: &Event| {
            tx.send(event.clone())
                .map_err(|_| anyhow!("event receiver dropped"))
        });
        (id, rx)
    }

    /// Removes a listener. Returns false if the ID was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Publishes an event built from `kind` and `data`.
    pub fn publish(&self, kind: EventKind, data: Value) {
        self.publish_event(&Event::new(kind, data));
    }

    /// Delivers a prebuilt event to every subscriber.
    pub fn publish_event(&self, event: &Event) {
        log::info!(target: EVENT_LOG_TARGET, "{}", render::render(event));

        // Snapshot so listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<(SubscriptionId, Listener)> = self.lock().clone();
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("Event listener {:?} failed on {}: {e}", id, event.kind)
                }
                Err(_) => log::error!("Event listener {:?} panicked on {}", id, event.kind),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        // A poisoned list is still structurally valid.
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_delivers_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |event: &Event| {
                seen.lock().unwrap().push(format!("{tag}:{}", event.kind));
                Ok(())
            });
        }

        bus.publish(EventKind::TaskStart, json!({}));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:task_start", "second:task_start"]
        );
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        bus.subscribe(|_: &Event| Err(anyhow!("nope")));
        bus.subscribe(|_: &Event| panic!("listener blew up"));
        let counter = Arc::clone(&count);
        bus.subscribe(move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(EventKind::StepStart, json!({"description": "x"}));
        bus.publish(EventKind::StepComplete, json!({"status": "completed"}));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(|_: &Event| Ok(()));
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_subscription_streams_events() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe_channel();

        bus.publish(EventKind::TaskStart, json!({"task_id": "t1"}));
        bus.publish(EventKind::Other("custom".to_string()), json!({}));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::TaskStart);
        assert_eq!(first.field_str("task_id"), Some("t1"));
        assert_eq!(rx.recv().await.unwrap().kind.as_str(), "custom");
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new(EventKind::ToolCallStart, json!({"tool_name": "t"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("tool_call_start"));
        assert_eq!(value["data"]["tool_name"], json!("t"));

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind, EventKind::ToolCallStart);

        let unknown: EventKind = serde_json::from_value(json!("general_progress")).unwrap();
        assert_eq!(unknown, EventKind::Other("general_progress".to_string()));
    }
}
