//! Connection registry
//!
//! Owns the record of every live relay connection for its whole lifetime.
//! Room membership lives in [`super::room::RoomManager`].

use appointly_shared::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::events::ServerEvent;

/// Socket id handed to clients as `socketId`
pub type ConnectionId = Uuid;

/// Represents an active relay connection
#[derive(Debug)]
pub struct Connection {
    /// Unique id for this connection
    pub id: ConnectionId,

    /// Identity from a verified bearer token, if the client presented one
    pub identity: Option<Identity>,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    pub connected_at: OffsetDateTime,
}

impl Connection {
    /// Create a new connection
    pub fn new(identity: Option<Identity>, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            sender,
            connected_at: OffsetDateTime::now_utc(),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Err if the connection's writer has gone away
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Display name for logs and call offers
    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.name.as_str())
    }
}

/// Registry of all live connections indexed by id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection on handshake
    pub async fn register(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.id, Arc::clone(&conn));

        tracing::info!(
            connection_id = %conn.id,
            user_id = ?conn.identity.as_ref().map(|i| i.user_id.0),
            total_connections = connections.len(),
            "Relay connection registered"
        );

        conn
    }

    /// Remove a connection. Returns the record only the first time.
    pub async fn deregister(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(id);
        if removed.is_some() {
            tracing::info!(
                connection_id = %id,
                remaining_connections = connections.len(),
                "Relay connection deregistered"
            );
        }
        removed
    }

    pub async fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Look up several connections at once, skipping ids that are gone
    pub async fn get_many(&self, ids: &[ConnectionId]) -> Vec<Arc<Connection>> {
        let connections = self.connections.read().await;
        ids.iter()
            .filter_map(|id| connections.get(id).cloned())
            .collect()
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}
