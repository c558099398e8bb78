//! WebSocket handler for Axum
//!
//! Upgrades the HTTP connection, runs one writer and one reader task per
//! socket, and hands every decoded event to the dispatcher.

use appointly_shared::Identity;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{
    dispatcher::dispatch,
    events::{self, ConnectedNotice, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via an optional query parameter token
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> ApiResult<Response> {
    let identity = authenticate(&app_state, params.token.as_deref())?;

    tracing::info!(
        user_id = ?identity.as_ref().map(|i| i.user_id.0),
        "Relay connection upgrade requested"
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, identity, app_state)))
}

/// Resolve the caller's identity from an optional bearer token
///
/// With `relay_require_auth` off, a missing or bad token yields an anonymous
/// connection instead of a rejection.
pub fn authenticate(app_state: &AppState, token: Option<&str>) -> ApiResult<Option<Identity>> {
    let require_auth = app_state.config.relay_require_auth;

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        if require_auth {
            tracing::warn!("Relay auth failed: no token");
            return Err(ApiError::Unauthorized);
        }
        return Ok(None);
    };

    match app_state.jwt.validate_token(token) {
        Ok(claims) => Ok(Some(claims.identity())),
        Err(e) if require_auth => {
            tracing::warn!(error = %e, "Relay auth failed: invalid token");
            Err(e.into())
        }
        Err(e) => {
            tracing::info!(error = %e, "Ignoring invalid relay token, connecting anonymously");
            Ok(None)
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, identity: Option<Identity>, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let relay = app_state.relay.clone();
    let conn = relay.connect(identity, tx).await;
    let connection_id = conn.id;

    if let Err(e) = conn.send(ServerEvent::Connected(ConnectedNotice {
        socket_id: connection_id,
    })) {
        tracing::warn!(connection_id = %connection_id, error = %e, "Failed to send connected notice");
    }

    // Writer: outbound events plus keepalive pings
    let ping_interval = Duration::from_secs(app_state.config.relay_ping_interval_secs);
    let mut send_task = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(ping_interval);
        keepalive.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sender.send(Message::Text(json)).await.is_err() {
                                break; // Connection closed
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = ?e, "Failed to serialize relay event");
                        }
                    }
                }
                _ = keepalive.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: decode and dispatch in arrival order
    let reader_relay = relay.clone();
    let reader_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => match events::decode(&text) {
                    Ok(event) => dispatch(&reader_relay, &reader_conn, event).await,
                    Err(e) => {
                        tracing::warn!(
                            connection_id = %reader_conn.id,
                            error = %e,
                            "Dropping malformed relay event"
                        );
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %reader_conn.id, "WebSocket close frame received");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(connection_id = %reader_conn.id, "Ignoring binary frame");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Axum handles ping/pong automatically
                }
                Err(e) => {
                    tracing::debug!(connection_id = %reader_conn.id, error = %e, "WebSocket read error");
                    break;
                }
            }
        }
    });

    // Whichever side finishes first ends the session. The other task must be
    // fully stopped before cleanup, or an in-flight join could outlive it.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    relay.disconnect(connection_id).await;
}
