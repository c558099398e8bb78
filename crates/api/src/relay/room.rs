//! Appointment room management for pub/sub
//!
//! Keeps both directions of membership (room -> connections and
//! connection -> rooms) behind a single lock, so a connection is listed in a
//! room exactly when the room is listed for the connection.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::connection::ConnectionId;
use super::events::RoomId;

#[derive(Debug, Default)]
struct RoomTable {
    /// room_id -> member connections
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    /// connection_id -> joined rooms
    joined: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomTable {
    fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove one membership from both indexes, dropping empty entries.
    /// Returns false if the connection was not in the room.
    fn remove(&mut self, conn_id: &ConnectionId, room_id: &RoomId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        if !members.remove(conn_id) {
            return false;
        }
        if members.is_empty() {
            self.rooms.remove(room_id);
            tracing::debug!(room_id = %room_id, "Removed empty room");
        }

        if let Some(rooms) = self.joined.get_mut(conn_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.joined.remove(conn_id);
            }
        }
        true
    }
}

/// Result of a join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Newly joined; lists the members that were already there
    Joined { existing: Vec<ConnectionId> },
    /// Already a member, nothing changed
    AlreadyMember,
}

/// Result of a leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Left the room; lists the members still in it (empty if the room is gone)
    Left { remaining: Vec<ConnectionId> },
    /// Was not a member (or the room does not exist), nothing changed
    NotMember,
}

/// Manages appointment rooms
#[derive(Debug, Default)]
pub struct RoomManager {
    table: RwLock<RoomTable>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room if needed
    pub async fn join(&self, conn_id: ConnectionId, room_id: &RoomId) -> JoinOutcome {
        let mut table = self.table.write().await;
        let existing = table.members(room_id);

        let members = table.rooms.entry(room_id.clone()).or_default();
        if !members.insert(conn_id) {
            return JoinOutcome::AlreadyMember;
        }
        let room_size = members.len();
        table
            .joined
            .entry(conn_id)
            .or_default()
            .insert(room_id.clone());

        tracing::debug!(
            room_id = %room_id,
            connection_id = %conn_id,
            room_size,
            "Connection joined room"
        );

        JoinOutcome::Joined { existing }
    }

    /// Remove a connection from a room; empty rooms are deleted
    pub async fn leave(&self, conn_id: &ConnectionId, room_id: &RoomId) -> LeaveOutcome {
        let mut table = self.table.write().await;
        if !table.remove(conn_id, room_id) {
            return LeaveOutcome::NotMember;
        }

        let remaining = table.members(room_id);
        tracing::debug!(
            room_id = %room_id,
            connection_id = %conn_id,
            room_size = remaining.len(),
            "Connection left room"
        );

        LeaveOutcome::Left { remaining }
    }

    /// Remove a connection from every room it joined
    ///
    /// Returns each room that still has members, with those members
    pub async fn leave_all(&self, conn_id: &ConnectionId) -> Vec<(RoomId, Vec<ConnectionId>)> {
        let mut table = self.table.write().await;
        let Some(rooms) = table.joined.remove(conn_id) else {
            return Vec::new();
        };

        let mut still_occupied = Vec::new();
        for room_id in rooms {
            let Some(members) = table.rooms.get_mut(&room_id) else {
                continue;
            };
            members.remove(conn_id);
            if members.is_empty() {
                table.rooms.remove(&room_id);
                tracing::debug!(room_id = %room_id, "Removed empty room");
            } else {
                let remaining = members.iter().copied().collect();
                still_occupied.push((room_id, remaining));
            }
        }

        tracing::debug!(
            connection_id = %conn_id,
            occupied_rooms = still_occupied.len(),
            "Removed connection from all rooms"
        );

        still_occupied
    }

    /// Current members of a room (empty for an unknown room)
    pub async fn members_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.table.read().await.members(room_id)
    }

    /// Rooms a connection has joined (empty for an unknown connection)
    pub async fn rooms_of(&self, conn_id: &ConnectionId) -> Vec<RoomId> {
        self.table
            .read()
            .await
            .joined
            .get(conn_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(&self, conn_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.table
            .read()
            .await
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains(conn_id))
    }

    /// Get room size (number of connections)
    pub async fn room_size(&self, room_id: &RoomId) -> usize {
        self.table
            .read()
            .await
            .rooms
            .get(room_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Get total number of active rooms
    pub async fn room_count(&self) -> usize {
        self.table.read().await.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn room(id: &str) -> RoomId {
        RoomId::try_from(id).unwrap()
    }

    /// Both indexes agree for every connection and room they mention
    async fn assert_consistent(manager: &RoomManager, conns: &[ConnectionId], rooms: &[RoomId]) {
        for conn in conns {
            for room_id in rooms {
                let in_room = manager.members_of(room_id).await.contains(conn);
                let in_joined = manager.rooms_of(conn).await.contains(room_id);
                assert_eq!(in_room, in_joined, "inconsistent membership for {conn} / {room_id}");
            }
        }
    }

    #[tokio::test]
    async fn test_room_join_and_leave() {
        let manager = RoomManager::new();
        let room_id = room("appt-1");
        let conn = Uuid::new_v4();

        assert_eq!(manager.room_size(&room_id).await, 0);

        let outcome = manager.join(conn, &room_id).await;
        assert_eq!(outcome, JoinOutcome::Joined { existing: vec![] });
        assert_eq!(manager.room_size(&room_id).await, 1);
        assert_eq!(manager.rooms_of(&conn).await, vec![room_id.clone()]);

        let outcome = manager.leave(&conn, &room_id).await;
        assert_eq!(outcome, LeaveOutcome::Left { remaining: vec![] });
        assert_eq!(manager.room_size(&room_id).await, 0);
        assert!(manager.rooms_of(&conn).await.is_empty());
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let manager = RoomManager::new();
        let room_id = room("appt-1");
        let conn = Uuid::new_v4();

        manager.join(conn, &room_id).await;
        assert_eq!(manager.join(conn, &room_id).await, JoinOutcome::AlreadyMember);

        assert_eq!(manager.members_of(&room_id).await, vec![conn]);
        assert_eq!(manager.rooms_of(&conn).await.len(), 1);
    }

    #[tokio::test]
    async fn test_join_reports_existing_members() {
        let manager = RoomManager::new();
        let room_id = room("appt-1");
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        manager.join(first, &room_id).await;
        assert_eq!(
            manager.join(second, &room_id).await,
            JoinOutcome::Joined { existing: vec![first] }
        );
        assert!(manager.is_member(&second, &room_id).await);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent_for_non_members() {
        let manager = RoomManager::new();
        let room_id = room("appt-1");
        let member = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert_eq!(manager.leave(&stranger, &room("nowhere")).await, LeaveOutcome::NotMember);

        manager.join(member, &room_id).await;
        assert_eq!(manager.leave(&stranger, &room_id).await, LeaveOutcome::NotMember);
        assert_eq!(manager.members_of(&room_id).await, vec![member]);
        assert_eq!(manager.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_rooms_are_collected() {
        let manager = RoomManager::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room_id = room("appt-1");

        manager.join(a, &room_id).await;
        manager.join(b, &room_id).await;
        assert_eq!(manager.room_count().await, 1);

        assert_eq!(
            manager.leave(&a, &room_id).await,
            LeaveOutcome::Left { remaining: vec![b] }
        );
        assert_eq!(manager.room_count().await, 1);

        manager.leave(&b, &room_id).await;
        assert_eq!(manager.room_count().await, 0);
        assert!(manager.members_of(&room_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_all_reports_occupied_rooms_only() {
        let manager = RoomManager::new();
        let leaver = Uuid::new_v4();
        let stayer = Uuid::new_v4();
        let shared = room("appt-shared");
        let solo = room("appt-solo");

        manager.join(leaver, &shared).await;
        manager.join(stayer, &shared).await;
        manager.join(leaver, &solo).await;
        assert_eq!(manager.room_count().await, 2);

        let occupied = manager.leave_all(&leaver).await;
        assert_eq!(occupied, vec![(shared.clone(), vec![stayer])]);
        assert_eq!(manager.room_count().await, 1);
        assert!(manager.rooms_of(&leaver).await.is_empty());

        // Nothing left to do the second time
        assert!(manager.leave_all(&leaver).await.is_empty());
    }

    #[tokio::test]
    async fn test_membership_stays_consistent_under_interleaving() {
        let manager = RoomManager::new();
        let conns: Vec<ConnectionId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let rooms: Vec<RoomId> = (0..3).map(|i| room(&format!("appt-{i}"))).collect();

        // Deterministic mix of joins, repeated joins, leaves and disconnects
        for step in 0..60usize {
            let conn = conns[step % conns.len()];
            let room_id = &rooms[(step * 7) % rooms.len()];
            match step % 5 {
                0 | 1 | 3 => {
                    manager.join(conn, room_id).await;
                }
                2 => {
                    manager.leave(&conn, room_id).await;
                }
                _ => {
                    manager.leave_all(&conn).await;
                }
            }
            assert_consistent(&manager, &conns, &rooms).await;
        }

        for conn in &conns {
            manager.leave_all(conn).await;
        }
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_joins_and_leaves() {
        use std::sync::Arc;

        let manager = Arc::new(RoomManager::new());
        let room_id = room("appt-busy");
        let mut handles = Vec::new();

        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            let room_id = room_id.clone();
            handles.push(tokio::spawn(async move {
                let conn = Uuid::new_v4();
                manager.join(conn, &room_id).await;
                manager.join(conn, &room_id).await;
                manager.leave(&conn, &room_id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.room_count().await, 0);
    }
}
