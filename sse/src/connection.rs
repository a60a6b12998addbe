use axum::response::sse::Event;
use dashmap::DashMap;
use log::*;
use std::collections::HashSet;
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedSender;

/// User ids are carried as strings; the web layer converts `entity::Id`.
pub type UserId = String;

pub type EventSender = UnboundedSender<Result<Event, Infallible>>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user_id: UserId,
    pub sender: EventSender,
}

/// Connection registry indexed both by connection and by user.
///
/// Senders whose receiving stream is gone are dropped the first time a send
/// to them fails.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    user_index: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    pub fn register(&self, user_id: UserId, sender: EventSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                user_id: user_id.clone(),
                sender,
            },
        );

        self.user_index
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());

        connection_id
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        if let Some((_, info)) = self.connections.remove(connection_id) {
            let user_id = info.user_id;

            if let Some(mut entry) = self.user_index.get_mut(&user_id) {
                entry.remove(connection_id);

                if entry.is_empty() {
                    drop(entry); // Release the shard lock before removing
                    self.user_index.remove(&user_id);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn send_to_user(&self, user_id: &UserId, event: Event) {
        let connection_ids: Vec<ConnectionId> = match self.user_index.get(user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return,
        };

        let closed: Vec<ConnectionId> = connection_ids
            .into_iter()
            .filter(|conn_id| !self.send_to(conn_id, event.clone()))
            .collect();

        self.prune(closed);
    }

    pub fn broadcast(&self, event: Event) {
        let connection_ids: Vec<ConnectionId> =
            self.connections.iter().map(|entry| entry.key().clone()).collect();

        let closed: Vec<ConnectionId> = connection_ids
            .into_iter()
            .filter(|conn_id| !self.send_to(conn_id, event.clone()))
            .collect();

        self.prune(closed);
    }

    /// Returns false when the receiving side has gone away.
    fn send_to(&self, conn_id: &ConnectionId, event: Event) -> bool {
        match self.connections.get(conn_id) {
            Some(info) => match info.sender.send(Ok(event)) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to send event to connection {}: {e}", conn_id.as_str());
                    false
                }
            },
            None => true,
        }
    }

    fn prune(&self, closed: Vec<ConnectionId>) {
        for conn_id in closed {
            debug!("Dropping closed SSE connection {}", conn_id.as_str());
            self.unregister(&conn_id);
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn broadcast_reaches_every_connection_of_every_user() {
        let registry = ConnectionRegistry::new();
        let (tab_one, mut rx_one) = mpsc::unbounded_channel();
        let (tab_two, mut rx_two) = mpsc::unbounded_channel();
        let (other, mut rx_other) = mpsc::unbounded_channel();
        registry.register("alice".to_string(), tab_one);
        registry.register("alice".to_string(), tab_two);
        registry.register("bob".to_string(), other);

        registry.broadcast(Event::default().data("refresh"));

        assert!(rx_one.try_recv().is_ok());
        assert!(rx_two.try_recv().is_ok());
        assert!(rx_other.try_recv().is_ok());
    }

    #[test]
    fn closed_receivers_are_pruned_on_send() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("alice".to_string(), tx);
        drop(rx);

        registry.send_to_user(&"alice".to_string(), Event::default().data("refresh"));

        assert!(registry.is_empty());
        assert!(registry.user_index.get("alice").is_none());
    }

    #[test]
    fn unregister_removes_empty_user_entries() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection_id = registry.register("alice".to_string(), tx);

        registry.unregister(&connection_id);

        assert_eq!(registry.len(), 0);
        assert!(registry.user_index.get("alice").is_none());
    }
}
