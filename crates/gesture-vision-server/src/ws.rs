//! WebSocket endpoint and subscriber tasks.
//!
//! Each connection gets its own task owning its outbound queue: it
//! serializes messages to the wire, parses inbound control messages, and
//! enforces the idle timeout. A failed send removes the subscriber; the
//! vision loop never sees subscriber errors.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gesture_vision_core::types::epoch_millis;

use crate::broadcaster::{Broadcaster, Outbound, SubscriberQueue};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::vision::ControlMessage;

/// Shared state for the WebSocket and health handlers.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out hub
    pub broadcaster: Arc<Broadcaster>,
    /// Channel into the vision loop for control messages
    pub control_tx: mpsc::UnboundedSender<ControlMessage>,
    /// Inbound silence window before a probe and close
    pub idle_timeout: Duration,
    /// Server start time, for uptime reporting
    pub started_at: std::time::Instant,
}

/// Build the router: the subscriber socket plus service-identity and
/// health endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "gesture-vision-server",
        "version": crate::VERSION,
        "websocket_path": "/ws",
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "clients_connected": state.broadcaster.subscriber_count(),
        "connections_total": state.broadcaster.connections_total(),
        "messages_sent": state.broadcaster.messages_sent(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state)).into_response()
}

/// Per-connection display flags from `config` messages.
#[derive(Default)]
struct ConnectionFlags {
    mirror: bool,
    idle_probe_sent: bool,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscriber = state.broadcaster.subscribe();
    let (mut sink, mut stream) = socket.split();

    if send_message(&mut sink, &ServerMessage::hello()).await.is_err() {
        state.broadcaster.unsubscribe(subscriber.id());
        return;
    }

    let mut flags = ConnectionFlags::default();
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            outbound = subscriber.recv() => {
                let done = match outbound {
                    Outbound::Gesture(event) => {
                        let message = ServerMessage::gesture(&event, flags.mirror);
                        send_message(&mut sink, &message).await.is_err()
                    }
                    Outbound::Status(update) => {
                        let message = ServerMessage::status(update, subscriber.dropped());
                        send_message(&mut sink, &message).await.is_err()
                    }
                    Outbound::Shutdown => {
                        let _ = sink.send(Message::Close(None)).await;
                        true
                    }
                };
                if done {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        flags.idle_probe_sent = false;
                        idle.as_mut().reset(Instant::now() + state.idle_timeout);
                        if handle_client_message(&text, &mut sink, &mut flags, &state, &subscriber)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = subscriber.id(), "client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary frames and transport pings count as liveness.
                        flags.idle_probe_sent = false;
                        idle.as_mut().reset(Instant::now() + state.idle_timeout);
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = subscriber.id(), error = %e, "receive failed");
                        break;
                    }
                }
            }
            () = &mut idle => {
                if flags.idle_probe_sent {
                    info!(subscriber = subscriber.id(), "idle timeout, closing");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                // One probe before giving up on a quiet client.
                flags.idle_probe_sent = true;
                idle.as_mut().reset(Instant::now() + state.idle_timeout);
                if send_message(&mut sink, &ServerMessage::ping(epoch_millis())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.broadcaster.unsubscribe(subscriber.id());
    info!(
        subscriber = subscriber.id(),
        remaining = state.broadcaster.subscriber_count(),
        "subscriber disconnected"
    );
}

/// Parse and act on one inbound text frame. Invalid messages are logged
/// and ignored; only transport errors end the connection.
async fn handle_client_message(
    text: &str,
    sink: &mut SplitSink<WebSocket, Message>,
    flags: &mut ConnectionFlags,
    state: &AppState,
    subscriber: &SubscriberQueue,
) -> Result<(), ()> {
    let parsed: ClientMessage = match serde_json::from_str(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(subscriber = subscriber.id(), error = %e, "ignoring unparseable message");
            return Ok(());
        }
    };

    match parsed {
        ClientMessage::Ping { .. } => {
            send_message(sink, &ServerMessage::pong(epoch_millis())).await.map_err(|_| ())
        }
        ClientMessage::Config {
            camera_index,
            flip_camera,
            mirror_mode,
        } => {
            if let Some(mirror) = mirror_mode {
                flags.mirror = mirror;
            }
            debug!(
                subscriber = subscriber.id(),
                ?camera_index,
                ?flip_camera,
                mirror = flags.mirror,
                "config accepted"
            );
            Ok(())
        }
        ClientMessage::ClearGestureHistory => {
            if state.control_tx.send(ControlMessage::ClearHistory).is_err() {
                warn!("vision loop gone, clear request dropped");
            }
            Ok(())
        }
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sink.send(Message::Text(json)).await,
        Err(e) => {
            // Serialization of our own DTOs cannot realistically fail;
            // treat it as a skipped frame rather than a dead connection.
            warn!(error = %e, "failed to serialize outbound message");
            Ok(())
        }
    }
}
