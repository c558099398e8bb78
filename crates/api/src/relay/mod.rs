//! Real-time relay for appointment chat and call signaling
//!
//! Two participants of an appointment join a shared room (keyed by the
//! appointment id), exchange chat messages, and pass WebRTC signaling blobs to
//! each other. Nothing is persisted; every event is fanned out once.
//!
//! # Architecture
//!
//! - **Connection**: registry of live sockets and their outbound channels
//! - **Room**: room <-> connection membership, kept consistent in both directions
//! - **Dispatcher**: maps each client event onto room updates and fan-out
//! - **State**: shared handle, fan-out helpers and disconnect cleanup
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: type-safe event definitions for client/server communication

pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod room;
pub mod state;

pub use handler::ws_handler;
pub use state::{RelayState, RelayStats};
