//! Relay event types and serialization
//!
//! Every frame on the wire is a JSON object `{"event": <name>, "data": <payload>}`.
//! Client-to-server and server-to-client events are closed enums so the
//! dispatcher can match them exhaustively.

use appointly_shared::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::connection::ConnectionId;

// =============================================================================
// Room Identifier
// =============================================================================

/// Opaque room key, normally an appointment id. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(RelayError::EmptyRoomId);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for RoomId {
    type Error = RelayError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join an appointment room
    JoinRoom(RoomId),

    /// Leave an appointment room
    LeaveRoom(RoomId),

    /// Chat message for everyone else in a room
    ChatMessage(ChatMessage),

    /// Offer a call (opaque signal) to a room or a specific connection
    CallUser(CallRequest),

    /// Answer an incoming call
    AnswerCall(CallAnswer),

    /// Hang up
    EndCall(CallEnd),
}

impl ClientEvent {
    /// Wire name of the event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "joinRoom",
            Self::LeaveRoom(_) => "leaveRoom",
            Self::ChatMessage(_) => "chatMessage",
            Self::CallUser(_) => "callUser",
            Self::AnswerCall(_) => "answerCall",
            Self::EndCall(_) => "endCall",
        }
    }
}

/// Decode a text frame into a client event
pub fn decode(text: &str) -> Result<ClientEvent, RelayError> {
    serde_json::from_str(text).map_err(RelayError::Malformed)
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged, carries the client's own socket id
    Connected(ConnectedNotice),

    /// Another connection joined a room this client is in
    UserJoined(MembershipNotice),

    /// Another connection left (or dropped out of) a room this client is in
    UserLeft(MembershipNotice),

    /// Chat message relayed from another room member
    ChatMessage(RelayedChatMessage),

    /// Incoming call offer
    CallUser(IncomingCall),

    /// The callee's answer signal
    CallAccepted(Value),

    /// The peer hung up
    CallEnded,
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Who sent a chat message: a bare display name or a profile object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sender {
    Name(String),
    Profile(SenderProfile),
}

/// Sender descriptor as built by the booking front-end
///
/// Only `name` is required. Whatever else the client attached (a database
/// `_id`, avatar, ...) is relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub message: String,
    pub sender: Sender,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl ChatMessage {
    /// Strip the room targeting for re-emission to members
    pub fn into_relayed(self) -> RelayedChatMessage {
        RelayedChatMessage {
            message: self.message,
            sender: self.sender,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedChatMessage {
    pub message: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Room id or socket id of the callee
    pub user_to_call: String,
    pub signal_data: Value,
    /// Caller reference supplied by the client; the relay replaces it with the
    /// caller's socket id so the answer can be routed back.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingCall {
    pub signal: Value,
    pub from: ConnectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallAnswer {
    pub signal: Value,
    /// Socket id of the caller (or a room id)
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallEnd {
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNotice {
    pub socket_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipNotice {
    pub message: String,
    pub socket_id: ConnectionId,
}

impl MembershipNotice {
    pub fn joined(socket_id: ConnectionId) -> Self {
        Self {
            message: "Someone joined the chat".to_string(),
            socket_id,
        }
    }

    pub fn left(socket_id: ConnectionId) -> Self {
        Self {
            message: "Someone left the chat".to_string(),
            socket_id,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Room id must not be empty")]
    EmptyRoomId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_room_takes_bare_room_id() {
        let event = decode(r#"{"event":"joinRoom","data":"appt-42"}"#).unwrap();
        match event {
            ClientEvent::JoinRoom(room_id) => assert_eq!(room_id.as_str(), "appt-42"),
            other => panic!("Expected JoinRoom, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_room_id_is_malformed() {
        let result = decode(r#"{"event":"leaveRoom","data":"  "}"#);
        assert!(matches!(result, Err(RelayError::Malformed(_))));
    }

    #[test]
    fn test_chat_message_accepts_both_sender_shapes() {
        let by_name = decode(
            r#"{"event":"chatMessage","data":{"roomId":"r1","message":"hi","sender":"Ada"}}"#,
        )
        .unwrap();
        assert!(matches!(
            by_name,
            ClientEvent::ChatMessage(ChatMessage { sender: Sender::Name(ref n), .. }) if n == "Ada"
        ));

        let by_profile = decode(
            r#"{"event":"chatMessage","data":{"roomId":"r1","message":"hi",
                "sender":{"id":"u1","name":"Ada","role":"teacher"},
                "timestamp":"2024-05-01T10:00:00Z"}}"#,
        )
        .unwrap();
        match by_profile {
            ClientEvent::ChatMessage(msg) => {
                assert_eq!(
                    msg.sender,
                    Sender::Profile(SenderProfile {
                        id: Some("u1".to_string()),
                        name: "Ada".to_string(),
                        role: Some(Role::Teacher),
                        extra: Map::new(),
                    })
                );
                assert_eq!(msg.timestamp, Some(json!("2024-05-01T10:00:00Z")));
            }
            other => panic!("Expected ChatMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_profile_without_id_is_relayed_as_sent() {
        let event = decode(
            r#"{"event":"chatMessage","data":{"roomId":"appt-42","message":"hi",
                "sender":{"name":"Ada","role":"teacher","_id":"665f"}}}"#,
        )
        .unwrap();
        let msg = match event {
            ClientEvent::ChatMessage(msg) => msg,
            other => panic!("Expected ChatMessage, got {:?}", other),
        };
        match &msg.sender {
            Sender::Profile(profile) => {
                assert_eq!(profile.id, None);
                assert_eq!(profile.role, Some(Role::Teacher));
            }
            other => panic!("Expected a profile sender, got {:?}", other),
        }

        let json = serde_json::to_value(ServerEvent::ChatMessage(msg.into_relayed())).unwrap();
        assert_eq!(
            json["data"]["sender"],
            json!({"name": "Ada", "role": "teacher", "_id": "665f"})
        );
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(decode(r#"{"event":"chatMessage","data":{"roomId":"r1","sender":"A"}}"#).is_err());
        assert!(decode(r#"{"event":"answerCall","data":{"to":"x"}}"#).is_err());
        assert!(decode(r#"{"event":"typing","data":"r1"}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn test_relayed_chat_message_drops_room_id() {
        let msg = ChatMessage {
            room_id: RoomId::try_from("appt-42").unwrap(),
            message: "hi".to_string(),
            sender: Sender::Name("A".to_string()),
            timestamp: None,
        };
        let json = serde_json::to_value(ServerEvent::ChatMessage(msg.into_relayed())).unwrap();
        assert_eq!(
            json,
            json!({"event": "chatMessage", "data": {"message": "hi", "sender": "A"}})
        );
    }

    #[test]
    fn test_server_event_serialization() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ServerEvent::UserLeft(MembershipNotice::left(id))).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "userLeft",
                "data": {"message": "Someone left the chat", "socketId": id.to_string()}
            })
        );

        let json = serde_json::to_string(&ServerEvent::CallEnded).unwrap();
        assert_eq!(json, r#"{"event":"callEnded"}"#);
    }
}
