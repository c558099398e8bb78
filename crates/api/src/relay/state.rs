//! Relay state shared across all connections
//!
//! Constructed once at startup and handed to every socket task. Also hosts
//! fan-out and the disconnect cleanup path.

use appointly_shared::Identity;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use super::connection::{Connection, ConnectionId, ConnectionRegistry};
use super::events::{MembershipNotice, RoomId, ServerEvent};
use super::room::RoomManager;

/// Relay state shared across all connections
#[derive(Clone, Default)]
pub struct RelayState {
    pub connections: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomManager>,
}

/// Counts from one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and acknowledge it with its socket id
    pub async fn connect(
        &self,
        identity: Option<Identity>,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Arc<Connection> {
        self.connections
            .register(Connection::new(identity, sender))
            .await
    }

    /// Push an event to each listed connection
    ///
    /// A closed recipient is skipped; the rest still get the event.
    pub async fn deliver(&self, recipients: &[ConnectionId], event: &ServerEvent) -> Delivery {
        let mut delivery = Delivery::default();
        for conn in self.connections.get_many(recipients).await {
            match conn.send(event.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => {
                    delivery.failed += 1;
                    tracing::warn!(
                        connection_id = %conn.id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }
        delivery
    }

    /// Send an event to every member of a room except `exclude`
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> Delivery {
        let recipients: Vec<ConnectionId> = self
            .rooms
            .members_of(room_id)
            .await
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .collect();

        if recipients.is_empty() {
            tracing::debug!(room_id = %room_id, "No other members in room - nothing to relay");
            return Delivery::default();
        }

        let delivery = self.deliver(&recipients, event).await;
        tracing::debug!(
            room_id = %room_id,
            recipients = delivery.delivered,
            failed = delivery.failed,
            "Broadcast event to room"
        );
        delivery
    }

    /// Tear down a connection after its transport went away
    ///
    /// Leaves every joined room and tells the members still in each room.
    /// Only the first call for a given id does anything; returns whether this
    /// call performed the cleanup.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> bool {
        let Some(conn) = self.connections.deregister(&conn_id).await else {
            return false;
        };

        let occupied = self.rooms.leave_all(&conn_id).await;
        let notice = ServerEvent::UserLeft(MembershipNotice::left(conn_id));
        for (room_id, remaining) in &occupied {
            let delivery = self.deliver(remaining, &notice).await;
            tracing::debug!(
                room_id = %room_id,
                connection_id = %conn_id,
                notified = delivery.delivered,
                "Notified room of departure"
            );
        }

        tracing::info!(
            connection_id = %conn_id,
            rooms_notified = occupied.len(),
            duration_secs = (OffsetDateTime::now_utc() - conn.connected_at).whole_seconds(),
            "Relay connection closed"
        );
        true
    }

    /// Get statistics about the relay state
    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            active_connections: self.connections.count().await,
            active_rooms: self.rooms.room_count().await,
        }
    }
}

/// Statistics about relay connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Number of active connections
    pub active_connections: usize,
    /// Number of rooms with at least one member
    pub active_rooms: usize,
}
