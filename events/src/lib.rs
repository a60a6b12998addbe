//! Domain events for the hyperlocal platform.
//!
//! Domain operations publish a [`DomainEvent`] after they have committed;
//! infrastructure such as the SSE broadcaster subscribes through
//! [`EventHandler`]. The crate depends on no other workspace crate, so entity
//! data travels as serialized JSON.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Matches `entity::Id`.
pub type Id = Uuid;

/// Business-level changes to the event catalog. Every one of them changes
/// what a listing would show, so they go to every connected client.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A host published a new event.
    EventCreated {
        /// The full serialized catalog entry.
        event: Value,
    },
    /// An administrator removed an event.
    EventDeleted { event_id: Id },
    /// A reservation was confirmed and one ticket was taken.
    InventoryChanged {
        event_id: Id,
        /// Tickets left after the change, as known to the publisher.
        remaining_tickets: i32,
    },
}

impl DomainEvent {
    /// Short stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EventCreated { .. } => "event_created",
            DomainEvent::EventDeleted { .. } => "event_deleted",
            DomainEvent::InventoryChanged { .. } => "inventory_changed",
        }
    }
}

/// Trait for handling domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Returns a publisher with `handler` appended. Store the returned
    /// publisher in application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
        tag: &'static str,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            self.seen.lock().unwrap().push(event.name());
            self.seen.lock().unwrap().push(self.tag);
        }
    }

    #[tokio::test]
    async fn publish_calls_handlers_in_registration_order() {
        let shared = Arc::new(Recorder {
            tag: "first",
            ..Default::default()
        });
        let publisher = EventPublisher::new().with_handler(shared.clone());

        publisher
            .publish(DomainEvent::EventDeleted {
                event_id: Id::new_v4(),
            })
            .await;

        assert_eq!(*shared.seen.lock().unwrap(), vec!["event_deleted", "first"]);
    }

    #[tokio::test]
    async fn with_handler_leaves_earlier_clones_untouched() {
        let recorder = Arc::new(Recorder::default());
        let bare = EventPublisher::default();
        let wired = bare.clone().with_handler(recorder.clone());

        bare.publish(DomainEvent::InventoryChanged {
            event_id: Id::new_v4(),
            remaining_tickets: 3,
        })
        .await;
        assert!(recorder.seen.lock().unwrap().is_empty());

        wired
            .publish(DomainEvent::InventoryChanged {
                event_id: Id::new_v4(),
                remaining_tickets: 2,
            })
            .await;
        assert_eq!(recorder.seen.lock().unwrap()[0], "inventory_changed");
    }
}
