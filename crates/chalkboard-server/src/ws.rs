//! WebSocket transport.
//!
//! Every connection gets a fresh session id, a bounded outbound queue
//! drained by a writer task, and a [`SocketHandle`] the engine delivers
//! through. Connections move from connected, to approved once the gate
//! admits them, to active once registered; only active connections may
//! touch the document.

use crate::dispatcher::Update;
use crate::error::ServerError;
use crate::server::WhiteboardServer;
use crate::session::{BoxFuture, ClientHandle, DeliveryError, SessionId};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use chalkboard_core::{ClientMessage, ServerMessage};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Build the HTTP router: index, WebSocket upgrade and health check.
pub fn router(server: Arc<WhiteboardServer>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Index page
async fn index() -> &'static str {
    "Chalkboard Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(server): State<Arc<WhiteboardServer>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

/// Wire messages that carry one engine update.
pub(crate) fn messages_for(update: &Update) -> Vec<ServerMessage> {
    match update {
        Update::Snapshot(snapshot) => vec![
            ServerMessage::RenderDrawings {
                shapes: snapshot.shapes.clone(),
            },
            ServerMessage::RenderChatMessages {
                messages: snapshot.chat.clone(),
            },
        ],
        Update::Shape(record) => vec![ServerMessage::Draw {
            shape: record.clone(),
        }],
        Update::Drawings(shapes) => vec![ServerMessage::RenderDrawings {
            shapes: shapes.clone(),
        }],
        Update::ChatLog(messages) => vec![ServerMessage::RenderChatMessages {
            messages: messages.clone(),
        }],
        Update::Cleared => vec![
            ServerMessage::Clear,
            ServerMessage::RenderDrawings { shapes: Vec::new() },
        ],
        Update::Chat(message) => vec![ServerMessage::ChatMessage {
            message: message.clone(),
        }],
        Update::Notice(text) => vec![ServerMessage::Notice { text: text.clone() }],
        Update::PeerJoined(name) => vec![ServerMessage::PeerJoined { name: name.clone() }],
        Update::PeerLeft(name) => vec![ServerMessage::PeerLeft { name: name.clone() }],
        Update::Close => vec![ServerMessage::CloseApplication],
    }
}

/// Engine-facing side of one socket.
pub struct SocketHandle {
    tx: mpsc::Sender<ServerMessage>,
    pending_pings: DashMap<u64, oneshot::Sender<bool>>,
    next_nonce: AtomicU64,
}

impl SocketHandle {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            tx,
            pending_pings: DashMap::new(),
            next_nonce: AtomicU64::new(1),
        }
    }

    /// Queue a direct reply. Dropped if the queue is full or closed.
    fn reply(&self, msg: ServerMessage) {
        if let Err(e) = self.tx.try_send(msg) {
            debug!("Dropped reply: {}", e);
        }
    }

    fn enqueue(&self, msg: ServerMessage) -> Result<(), DeliveryError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }

    /// Complete the ping waiting on `nonce`, if any.
    fn resolve_ping(&self, nonce: u64, alive: bool) {
        match self.pending_pings.remove(&nonce) {
            Some((_, reply)) => {
                let _ = reply.send(alive);
            }
            None => debug!(nonce, "Pong for unknown ping"),
        }
    }
}

impl ClientHandle for SocketHandle {
    fn deliver(&self, update: &Update) -> Result<(), DeliveryError> {
        for msg in messages_for(update) {
            self.enqueue(msg)?;
        }
        Ok(())
    }

    fn ping(&self) -> BoxFuture<'_, Result<bool, DeliveryError>> {
        Box::pin(async move {
            let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
            let (reply, answer) = oneshot::channel();
            self.pending_pings.insert(nonce, reply);
            let _pending = PendingPing {
                pings: &self.pending_pings,
                nonce,
            };
            self.enqueue(ServerMessage::Ping { nonce })?;
            answer.await.map_err(|_| DeliveryError::Disconnected)
        })
    }
}

/// Forgets a ping when its future completes or is dropped.
struct PendingPing<'a> {
    pings: &'a DashMap<u64, oneshot::Sender<bool>>,
    nonce: u64,
}

impl Drop for PendingPing<'_> {
    fn drop(&mut self) {
        self.pings.remove(&self.nonce);
    }
}

/// Where a connection is in the join handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Connected,
    Approved(String),
    Active(String),
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, server: Arc<WhiteboardServer>) {
    let id: SessionId = Uuid::new_v4();
    info!(session = %id, "New connection");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(server.config().queue_capacity);
    let handle = Arc::new(SocketHandle::new(tx));

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(session = %id, "Failed to encode message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            if matches!(msg, ServerMessage::CloseApplication) {
                let _ = sink.close().await;
                break;
            }
        }
    });

    let mut phase = Phase::Connected;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => {
                    if handle_message(&server, id, &handle, &mut phase, msg)
                        .await
                        .is_break()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(session = %id, "Invalid message: {}", e);
                    handle.reply(ServerMessage::Error {
                        message: format!("Invalid message: {}", e),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // Ignore binary and transport-level ping/pong
            Err(e) => {
                warn!(session = %id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    server.remove_client(id).await;
    writer.abort();
    info!(session = %id, "Connection closed");
}

fn error_reply(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

/// Apply one client message. `Break` closes the connection.
async fn handle_message(
    server: &WhiteboardServer,
    id: SessionId,
    handle: &Arc<SocketHandle>,
    phase: &mut Phase,
    msg: ClientMessage,
) -> ControlFlow<()> {
    match msg {
        ClientMessage::Pong { nonce, alive } => handle.resolve_ping(nonce, alive),
        ClientMessage::RequestConnection { name } => {
            if let Phase::Active(current) = phase {
                handle.reply(error_reply(format!("Already joined as {current}")));
                return ControlFlow::Continue(());
            }
            let name = name.trim().to_string();
            let allowed = server.request_connection(&name).await;
            handle.reply(ServerMessage::ConnectionDecision { allowed });
            *phase = if allowed {
                Phase::Approved(name)
            } else {
                Phase::Connected
            };
        }
        ClientMessage::AddClient => {
            let Phase::Approved(name) = phase else {
                handle.reply(error_reply(ServerError::NotApproved.to_string()));
                return ControlFlow::Continue(());
            };
            let name = name.clone();
            let client: Arc<dyn ClientHandle> = handle.clone();
            match server.add_client(id, &name, client).await {
                Ok(()) => *phase = Phase::Active(name),
                Err(e @ ServerError::NameTaken(_)) => {
                    handle.reply(error_reply(e.to_string()));
                    *phase = Phase::Connected;
                }
                Err(e) => {
                    error!(session = %id, error = %e, "Registration failed");
                    handle.reply(error_reply(e.to_string()));
                    return ControlFlow::Break(());
                }
            }
        }
        ClientMessage::RemoveClient => {
            if matches!(phase, Phase::Active(_)) {
                server.remove_client(id).await;
            }
            *phase = Phase::Connected;
        }
        op => {
            let Phase::Active(author) = phase else {
                handle.reply(error_reply("Join the whiteboard first"));
                return ControlFlow::Continue(());
            };
            if !server.is_active(id).await {
                info!(session = %id, "Evicted connection is still writing, closing");
                return ControlFlow::Break(());
            }
            let result = match op {
                ClientMessage::DrawShape { shape, color } => {
                    server.draw_shape(shape, color).await.map(drop)
                }
                ClientMessage::DrawText { text, x, y, color } => {
                    server.draw_text(&text, x, y, color).await.map(drop)
                }
                ClientMessage::Chat { text } => {
                    server.add_chat_message(author, &text).await.map(drop)
                }
                ClientMessage::Clear => {
                    server.clear().await;
                    Ok(())
                }
                ClientMessage::GetDrawings => {
                    server.send_drawings(id).await;
                    Ok(())
                }
                ClientMessage::GetChat => {
                    server.send_chat(id).await;
                    Ok(())
                }
                ClientMessage::RequestConnection { .. }
                | ClientMessage::AddClient
                | ClientMessage::RemoveClient
                | ClientMessage::Pong { .. } => Ok(()),
            };
            if let Err(e) = result {
                debug!(session = %id, error = %e, "Rejected operation");
                handle.reply(error_reply(e.to_string()));
            }
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chalkboard_core::{ChatMessage, DocumentSnapshot, Line, Rgb, Shape, ShapeRecord};
    use kurbo::Point;
    use std::time::Duration;

    fn record() -> ShapeRecord {
        ShapeRecord {
            seq: 1,
            shape: Shape::Line(Line::new(Point::ZERO, Point::new(1.0, 1.0))),
            color: Rgb::black(),
        }
    }

    #[test]
    fn test_snapshot_becomes_two_renders() {
        let chat = ChatMessage {
            seq: 1,
            author: "A".into(),
            text: "hi".into(),
            timestamp_ms: 0,
        };
        let snapshot = DocumentSnapshot {
            shapes: vec![record()],
            chat: vec![chat.clone()],
        };
        assert_eq!(
            messages_for(&Update::Snapshot(snapshot)),
            vec![
                ServerMessage::RenderDrawings {
                    shapes: vec![record()]
                },
                ServerMessage::RenderChatMessages {
                    messages: vec![chat]
                },
            ]
        );
    }

    #[test]
    fn test_cleared_renders_empty_canvas() {
        assert_eq!(
            messages_for(&Update::Cleared),
            vec![
                ServerMessage::Clear,
                ServerMessage::RenderDrawings { shapes: Vec::new() }
            ]
        );
        assert_eq!(
            messages_for(&Update::Close),
            vec![ServerMessage::CloseApplication]
        );
    }

    #[test]
    fn test_requested_logs_become_renders() {
        assert_eq!(
            messages_for(&Update::Drawings(vec![record()])),
            vec![ServerMessage::RenderDrawings {
                shapes: vec![record()]
            }]
        );
        assert_eq!(
            messages_for(&Update::ChatLog(Vec::new())),
            vec![ServerMessage::RenderChatMessages {
                messages: Vec::new()
            }]
        );
    }

    #[tokio::test]
    async fn test_deliver_enqueues() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = SocketHandle::new(tx);
        handle.deliver(&Update::Shape(record())).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Draw { shape: record() })
        );
    }

    #[tokio::test]
    async fn test_full_queue_is_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = SocketHandle::new(tx);
        handle.deliver(&Update::Notice("one".into())).unwrap();
        assert_eq!(
            handle.deliver(&Update::Notice("two".into())),
            Err(DeliveryError::QueueFull)
        );
    }

    #[tokio::test]
    async fn test_closed_queue_is_disconnected() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SocketHandle::new(tx);
        assert_eq!(
            handle.deliver(&Update::Cleared),
            Err(DeliveryError::Disconnected)
        );
        assert_eq!(handle.ping().await, Err(DeliveryError::Disconnected));
        assert!(handle.pending_pings.is_empty());
    }

    #[tokio::test]
    async fn test_ping_resolved_by_pong() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Arc::new(SocketHandle::new(tx));

        let pinging = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.ping().await })
        };
        let Some(ServerMessage::Ping { nonce }) = rx.recv().await else {
            panic!("expected a ping");
        };
        handle.resolve_ping(nonce, true);
        assert_eq!(pinging.await.unwrap(), Ok(true));
        assert!(handle.pending_pings.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_ping_is_forgotten() {
        let (tx, _rx) = mpsc::channel(8);
        let handle = SocketHandle::new(tx);
        let result = tokio::time::timeout(Duration::from_millis(20), handle.ping()).await;
        assert!(result.is_err());
        assert!(handle.pending_pings.is_empty());
    }
}
