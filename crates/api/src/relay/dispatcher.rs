//! Relay protocol handling
//!
//! Turns one decoded client event into room updates and outbound events.
//! Each connection's events are dispatched one at a time, in arrival order.

use std::sync::Arc;
use uuid::Uuid;

use super::connection::{Connection, ConnectionId};
use super::events::{
    CallAnswer, CallEnd, CallRequest, ChatMessage, ClientEvent, IncomingCall, MembershipNotice,
    RoomId, ServerEvent,
};
use super::room::{JoinOutcome, LeaveOutcome};
use super::state::RelayState;

/// Where a signaling event should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// One specific live connection
    Connection(ConnectionId),
    /// Every member of a room except the sender
    Room(RoomId),
}

/// Handle a client event from `conn`
pub async fn dispatch(state: &RelayState, conn: &Arc<Connection>, event: ClientEvent) {
    tracing::trace!(connection_id = %conn.id, event = event.name(), "Dispatching client event");

    if !state.connections.contains(&conn.id).await {
        tracing::debug!(
            connection_id = %conn.id,
            event = event.name(),
            "Event from a closed connection - ignoring"
        );
        return;
    }

    match event {
        ClientEvent::JoinRoom(room_id) => join_room(state, conn, room_id).await,
        ClientEvent::LeaveRoom(room_id) => leave_room(state, conn, room_id).await,
        ClientEvent::ChatMessage(message) => chat_message(state, conn, message).await,
        ClientEvent::CallUser(request) => call_user(state, conn, request).await,
        ClientEvent::AnswerCall(answer) => answer_call(state, conn, answer).await,
        ClientEvent::EndCall(end) => end_call(state, conn, end).await,
    }
}

async fn join_room(state: &RelayState, conn: &Connection, room_id: RoomId) {
    match state.rooms.join(conn.id, &room_id).await {
        JoinOutcome::Joined { existing } => {
            tracing::info!(
                connection_id = %conn.id,
                room_id = %room_id,
                user = ?conn.display_name(),
                "Connection joined room"
            );
            let notice = ServerEvent::UserJoined(MembershipNotice::joined(conn.id));
            state.deliver(&existing, &notice).await;
        }
        JoinOutcome::AlreadyMember => {
            tracing::debug!(connection_id = %conn.id, room_id = %room_id, "Already in room");
        }
    }
}

async fn leave_room(state: &RelayState, conn: &Connection, room_id: RoomId) {
    match state.rooms.leave(&conn.id, &room_id).await {
        LeaveOutcome::Left { remaining } => {
            tracing::info!(connection_id = %conn.id, room_id = %room_id, "Connection left room");
            let notice = ServerEvent::UserLeft(MembershipNotice::left(conn.id));
            state.deliver(&remaining, &notice).await;
        }
        LeaveOutcome::NotMember => {
            tracing::debug!(
                connection_id = %conn.id,
                room_id = %room_id,
                "Leave for a room the connection is not in - ignoring"
            );
        }
    }
}

async fn chat_message(state: &RelayState, conn: &Connection, message: ChatMessage) {
    let room_id = message.room_id.clone();
    let event = ServerEvent::ChatMessage(message.into_relayed());
    state.broadcast(&room_id, &event, Some(conn.id)).await;
}

async fn call_user(state: &RelayState, conn: &Connection, request: CallRequest) {
    let name = request
        .name
        .or_else(|| conn.display_name().map(str::to_string))
        .or(request.from);
    let event = ServerEvent::CallUser(IncomingCall {
        signal: request.signal_data,
        from: conn.id,
        name,
    });
    relay_signal(state, conn, &request.user_to_call, &event).await;
}

async fn answer_call(state: &RelayState, conn: &Connection, answer: CallAnswer) {
    let event = ServerEvent::CallAccepted(answer.signal);
    relay_signal(state, conn, &answer.to, &event).await;
}

async fn end_call(state: &RelayState, conn: &Connection, end: CallEnd) {
    relay_signal(state, conn, &end.to, &ServerEvent::CallEnded).await;
}

/// Decide where a signaling target points
///
/// A live socket id wins; anything else is taken as a room id.
pub async fn resolve_target(state: &RelayState, target: &str) -> Option<Route> {
    if let Ok(id) = Uuid::parse_str(target) {
        if state.connections.contains(&id).await {
            return Some(Route::Connection(id));
        }
    }
    RoomId::try_from(target).ok().map(Route::Room)
}

async fn relay_signal(state: &RelayState, conn: &Connection, target: &str, event: &ServerEvent) {
    match resolve_target(state, target).await {
        Some(Route::Connection(id)) if id == conn.id => {
            tracing::debug!(connection_id = %conn.id, "Signal addressed to sender - dropping");
        }
        Some(Route::Connection(id)) => {
            state.deliver(&[id], event).await;
        }
        Some(Route::Room(room_id)) => {
            state.broadcast(&room_id, event, Some(conn.id)).await;
        }
        None => {
            tracing::debug!(connection_id = %conn.id, "Signal with empty target - dropping");
        }
    }
}
