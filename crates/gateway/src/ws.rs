//! Axum websocket handler: one task per connection, each frame handed to
//! the [`Dispatcher`] in turn.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

use chrono::Utc;

use conduit_core::session::ClientDescriptor;

use crate::dispatcher::Dispatcher;
use crate::frame::{
    parse_ingress, parse_workflow_action, ConnectionEstablishedFrame, EgressFrame, ErrorFrame, IngressKind,
    PongFrame, StatusResponseFrame, WorkflowFrame,
};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // The transport-level connection id, distinct from the session id:
    // used only as `ClientDescriptor.connection_id` and as the fallback
    // key `resolve_session` checks before minting a brand new session.
    let connection_bound_id = Uuid::new_v4().to_string();

    // §4.12 "connect" event: allocate a session up front and tell the
    // client its id before any chat traffic flows. `bound_session_id`
    // tracks the REAL session id from here on, so later frames that omit
    // `sessionId` resolve back to this same session instead of minting a
    // fresh one every message (the Open Question in SPEC_FULL §9: trust a
    // message-supplied id if live, else the connection-bound id).
    let connect_client = ClientDescriptor {
        connection_id: Some(connection_bound_id.clone()),
        ..Default::default()
    };
    let mut bound_session_id = state
        .dispatcher
        .resolve_session(None, &connection_bound_id, connect_client)
        .await;
    let established = ConnectionEstablishedFrame::new(bound_session_id.clone(), Utc::now());
    if send_json(&mut socket, &established).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) => {
                let frame = ErrorFrame::new("malformed JSON frame");
                let _ = send_json(&mut socket, &frame).await;
                continue;
            }
        };

        if let Some(action) = parse_workflow_action(&value) {
            match state.dispatcher.handle_workflow_action(&bound_session_id, action).await {
                Ok(workflow_state) => {
                    let frame = WorkflowFrame::from(&workflow_state);
                    if send_json(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let frame = ErrorFrame::new(err.to_string());
                    let _ = send_json(&mut socket, &frame).await;
                }
            }
            continue;
        }

        let inbound = match parse_ingress(&value) {
            Some(inbound) => inbound,
            None => {
                let frame = ErrorFrame::new("frame missing a recognized text field");
                let _ = send_json(&mut socket, &frame).await;
                continue;
            }
        };

        let client = ClientDescriptor {
            connection_id: Some(connection_bound_id.clone()),
            ..Default::default()
        };
        let session_id = state
            .dispatcher
            .resolve_session(inbound.session_id.as_deref(), &bound_session_id, client)
            .await;
        bound_session_id = session_id.clone();

        match inbound.kind {
            IngressKind::Ping => {
                let message_id = inbound.message_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let frame = PongFrame::new(message_id, Utc::now());
                if send_json(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
            IngressKind::System => {
                // The only admin command modeled (§4.12): "status". Any
                // other system payload still gets an `ok` status_response
                // rather than being silently dropped.
                let frame = StatusResponseFrame::new(session_id.clone(), Utc::now());
                if send_json(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
            IngressKind::UserMessage => {
                let outcome = state.dispatcher.handle_message(&session_id, inbound).await;
                let egress = EgressFrame::from_outcome(outcome);
                if send_json(&mut socket, &egress).await.is_err() {
                    break;
                }
            }
        }
    }

    state.dispatcher.close_session(&bound_session_id).await;
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{\"type\":\"error\"}".to_string());
    socket.send(WsMessage::Text(text)).await
}
