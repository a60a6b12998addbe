use crate::message::{Event as SseEvent, Message as SseMessage, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Broadcasts catalog domain events to every open SSE connection.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }

    fn to_sse_event(event: &DomainEvent) -> SseEvent {
        match event {
            DomainEvent::EventCreated { event } => SseEvent::EventCreated {
                event: event.clone(),
            },
            DomainEvent::EventDeleted { event_id } => SseEvent::EventDeleted {
                event_id: event_id.to_string(),
            },
            DomainEvent::InventoryChanged {
                event_id,
                remaining_tickets,
            } => SseEvent::InventoryChanged {
                event_id: event_id.to_string(),
                remaining_tickets: *remaining_tickets,
            },
        }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!(
            "Broadcasting {} to {} SSE connection(s)",
            event.name(),
            self.sse_manager.connection_count()
        );

        self.sse_manager.send_message(SseMessage {
            event: Self::to_sse_event(event),
            scope: MessageScope::Broadcast,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn inventory_changes_reach_every_connection() {
        let manager = Arc::new(Manager::new());
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        manager.register_connection("alice".to_string(), alice_tx);
        manager.register_connection("bob".to_string(), bob_tx);

        let handler = SseDomainEventHandler::new(manager.clone());
        handler
            .handle(&DomainEvent::InventoryChanged {
                event_id: events::Id::new_v4(),
                remaining_tickets: 7,
            })
            .await;

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_ok());
    }
}
