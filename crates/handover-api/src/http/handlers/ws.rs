//! WebSocket handler for live conversation streaming.
//!
//! The `/ws/chat` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Forwards events:** Subscribes to the [`EventBus`] and pushes every
//!   event for the watched conversation to the client as a JSON text
//!   frame. `new_message` frames carry the message projected for the
//!   viewer's role, so internal notes and moderation fields never reach a
//!   customer socket and masked admin replies arrive as assistant
//!   replies.
//! - **Receives commands:** Parses incoming text frames as [`WsCommand`]
//!   and processes subscriptions, typing notifications, and pings. A
//!   subscribe is answered with an ack plus a replay of recent history.
//! - **Tracks presence:** An admin socket marks the admin online on
//!   connect and offline on disconnect. A customer socket going away
//!   bumps the conversation's activity timestamp.
//!
//! Lagged receivers (when the client is too slow to keep up) are handled
//! gracefully: the handler logs a warning and continues receiving.
//!
//! [`EventBus`]: handover_core::event::EventBus

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use handover_core::repository::{AdminSessionRepository, ConversationRepository};
use handover_core::visibility::{self, MessageView};
use handover_types::admin::{AdminSession, AdminStatus};
use handover_types::event::ChatEvent;
use handover_types::message::Role;

use crate::realtime::LiveSession;
use crate::state::AppState;

/// How many messages are replayed to a socket on subscribe.
const HISTORY_REPLAY: i64 = 50;

/// Incoming command from a WebSocket client.
///
/// Clients send JSON-encoded text frames matching one of these variants.
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Watch a conversation. Replaces any previous subscription.
    Subscribe { conversation_id: String },
    /// Typing indicator, relayed to the other watchers.
    Typing { is_typing: bool },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Connection parameters supplied at upgrade time. Identity is validated
/// upstream; this layer trusts the stated role.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub viewer: Option<Role>,
    #[serde(default)]
    pub name: Option<String>,
    /// Required for admin sockets so presence can track the connection.
    #[serde(default)]
    pub admin_id: Option<Uuid>,
}

/// Upgrade an HTTP request to a WebSocket connection for chat events.
///
/// Mounted at `/ws/chat` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let viewer = query.viewer.unwrap_or(Role::Customer);
    let name = query.name.unwrap_or_else(|| "anonymous".to_string());
    let admin_id = query.admin_id.filter(|_| viewer.is_admin());
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, viewer, name, admin_id))
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between bus events and incoming
/// client frames in a single task, enabling bidirectional communication.
async fn handle_ws_connection(
    socket: WebSocket,
    state: AppState,
    viewer: Role,
    name: String,
    admin_id: Option<Uuid>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let socket_id = state.registry.connect(viewer, name.clone(), admin_id);
    let mut event_rx = state.event_bus.subscribe();

    // An admin socket marks the admin online for the duration of the
    // connection. Presence failures are not fatal to the socket.
    if let Some(admin_id) = admin_id {
        let session = AdminSession::online(admin_id, name, viewer);
        if let Err(error) = state.admin_sessions.upsert(&session).await {
            tracing::warn!(%error, %admin_id, "failed to mark admin online");
        }
    }

    loop {
        tokio::select! {
            // --- Branch 1: Forward bus events to the WebSocket client ---
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        let session = state.registry.get(socket_id);
                        let Some(frame) = outbound_frame(&event, session.as_ref()) else {
                            continue;
                        };
                        if ws_sender.send(WsMessage::Text(frame.into())).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            skipped = n,
                            "WebSocket subscriber lagged, skipping {n} events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Bus sender dropped (server shutting down)
                        break;
                    }
                }
            }

            // --- Branch 2: Process commands from the WebSocket client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(WsMessage::Text(text))) => {
                        process_command(&text, socket_id, &state, &mut ws_sender).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let parting = state.registry.get(socket_id);
    state.registry.disconnect(socket_id);

    if let Some(session) = parting {
        match session.admin_id {
            Some(admin_id) => {
                if let Err(error) = state
                    .admin_sessions
                    .set_status(&admin_id, AdminStatus::Offline, Utc::now())
                    .await
                {
                    tracing::warn!(%error, %admin_id, "failed to mark admin offline");
                }
            }
            None => {
                // A customer vanishing mid-conversation still counts as
                // activity, so idle sweeps see the right timestamp.
                if let Some(conversation_id) = session.conversation_id {
                    if let Err(error) = state
                        .conversations
                        .record_activity(&conversation_id, Utc::now())
                        .await
                    {
                        tracing::warn!(%error, %conversation_id, "failed to record disconnect activity");
                    }
                }
            }
        }
    }
    tracing::debug!("WebSocket connection closed");
}

/// Build the JSON frame for one event, or `None` when this socket should
/// not see it.
///
/// Only events for the subscribed conversation pass. `NewMessage` payloads
/// are projected through the viewer's role; an event whose message the
/// viewer may not see produces no frame at all.
fn outbound_frame(event: &ChatEvent, session: Option<&LiveSession>) -> Option<String> {
    let session = session?;
    let watched = session.conversation_id?;
    if event.conversation_id() != watched {
        return None;
    }

    match event {
        ChatEvent::NewMessage {
            conversation_id,
            message,
        } => {
            let view = visibility::project(message, session.viewer)?;
            serde_json::to_string(&serde_json::json!({
                "type": "new_message",
                "conversation_id": conversation_id,
                "message": view,
            }))
            .ok()
        }
        // Staffing events would reveal the human handover to the customer.
        ChatEvent::TakeoverGranted { .. }
        | ChatEvent::TakeoverReleased { .. }
        | ChatEvent::Escalated { .. }
        | ChatEvent::CorrectionCaptured { .. }
            if !session.viewer.is_admin() =>
        {
            None
        }
        other => match serde_json::to_string(other) {
            Ok(json) => Some(json),
            Err(err) => {
                tracing::warn!("Failed to serialize event: {err}");
                None
            }
        },
    }
}

/// Build the history replay frame sent right after a subscribe ack. The
/// messages are already projected for the viewer's role.
fn history_frame(conversation_id: Uuid, messages: &[MessageView]) -> Option<String> {
    serde_json::to_string(&serde_json::json!({
        "type": "history",
        "conversation_id": conversation_id,
        "messages": messages,
    }))
    .ok()
}

/// Parse and process a single command from the WebSocket client.
async fn process_command(
    text: &str,
    socket_id: Uuid,
    state: &AppState,
    ws_sender: &mut (impl SinkExt<WsMessage, Error = axum::Error> + Unpin),
) {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket command"
            );
            return;
        }
    };

    match cmd {
        WsCommand::Subscribe { conversation_id } => match Uuid::parse_str(&conversation_id) {
            Ok(id) => {
                state.registry.subscribe(socket_id, id);
                tracing::debug!(%conversation_id, "socket subscribed");
                let ack = format!(
                    r#"{{"type":"subscribed","conversation_id":"{id}"}}"#
                );
                if ws_sender.send(WsMessage::Text(ack.into())).await.is_err() {
                    tracing::debug!("Failed to send subscribe ack (client disconnecting)");
                }

                // Replay recent history so a reconnecting client does not
                // start from a blank transcript.
                let viewer = state
                    .registry
                    .get(socket_id)
                    .map(|s| s.viewer)
                    .unwrap_or(Role::Customer);
                match state.chat_service.history(id, viewer, HISTORY_REPLAY, None).await {
                    Ok(messages) => {
                        if let Some(frame) = history_frame(id, &messages) {
                            if ws_sender.send(WsMessage::Text(frame.into())).await.is_err() {
                                tracing::debug!("Failed to send history (client disconnecting)");
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, %id, "failed to load history for replay");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%conversation_id, error = %err, "Subscribe: invalid UUID");
            }
        },
        WsCommand::Typing { is_typing } => {
            let Some(session) = state.registry.get(socket_id) else {
                return;
            };
            let Some(conversation_id) = session.conversation_id else {
                tracing::debug!("Typing before subscribe, ignored");
                return;
            };
            state.event_bus.publish(ChatEvent::Typing {
                conversation_id,
                sender_name: session.display_name.clone(),
                is_admin: session.viewer.is_admin(),
                is_typing,
            });
        }
        WsCommand::Ping => {
            let pong = r#"{"type":"pong"}"#;
            if ws_sender.send(WsMessage::Text(pong.into())).await.is_err() {
                tracing::debug!("Failed to send pong (client disconnecting)");
            }
        }
    }
}
