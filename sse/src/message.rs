use serde::Serialize;
use serde_json::Value;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    // Catalog changes (broadcast)
    #[serde(rename = "event_created")]
    EventCreated { event: Value },
    #[serde(rename = "event_deleted")]
    EventDeleted { event_id: String },
    #[serde(rename = "inventory_changed")]
    InventoryChanged {
        event_id: String,
        remaining_tickets: i32,
    },

    // Account changes (user-scoped)
    #[serde(rename = "role_changed")]
    RoleChanged { role: String },
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::EventCreated { .. } => "event_created",
            Event::EventDeleted { .. } => "event_deleted",
            Event::InventoryChanged { .. } => "inventory_changed",
            Event::RoleChanged { .. } => "role_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to all connections for a specific user
    User { user_id: String },
    /// Send to all connected users
    Broadcast,
}
