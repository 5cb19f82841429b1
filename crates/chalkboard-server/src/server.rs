//! The whiteboard engine.
//!
//! [`WhiteboardServer`] owns the one shared document and everything needed
//! to keep clients in step with it. Mutations hold the document lock while
//! they commit and while they fan out, so every client sees changes in
//! commit order. Locks are always taken document first, registry second.

use crate::admission::{AdmissionGate, ApprovalSurface};
use crate::config::ServerConfig;
use crate::dispatcher::{BroadcastDispatcher, Update};
use crate::error::{ServerError, ServerResult};
use crate::liveness::LivenessMonitor;
use crate::registry::ClientRegistry;
use crate::session::{ClientHandle, ClientSession, SessionId};
use chalkboard_core::{
    ChatMessage, DocumentSnapshot, REMOVED_NOTICE, Rgb, Shape, ShapeRecord, SharedDocument, Text,
};
use kurbo::Point;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct WhiteboardServer {
    config: ServerConfig,
    document: Mutex<SharedDocument>,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    gate: AdmissionGate,
    liveness: Arc<LivenessMonitor>,
}

impl WhiteboardServer {
    /// Build a server with an empty document.
    pub fn new(config: ServerConfig, surface: Arc<dyn ApprovalSurface>) -> ServerResult<Arc<Self>> {
        config.validate()?;

        let registry = Arc::new(ClientRegistry::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(Arc::clone(&registry)));
        let gate = AdmissionGate::new(
            config.operator_name.clone(),
            surface,
            config.admission_timeout,
        );
        let liveness = Arc::new(LivenessMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            config.ping_interval,
            config.ping_timeout,
        ));

        Ok(Arc::new(Self {
            config,
            document: Mutex::new(SharedDocument::new()),
            registry,
            dispatcher,
            gate,
            liveness,
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the background liveness loop.
    pub fn spawn_liveness(&self) -> JoinHandle<()> {
        Arc::clone(&self.liveness).spawn()
    }

    /// Run a single liveness round now.
    pub async fn probe_liveness(&self) -> Vec<String> {
        self.liveness.probe_once().await
    }

    /// Ask whether `name` may join. Waits for the operator if needed.
    pub async fn request_connection(&self, name: &str) -> bool {
        self.gate.request_connection(name).await
    }

    /// Register an approved client and send it the current state.
    pub async fn add_client(
        &self,
        id: SessionId,
        name: &str,
        handle: Arc<dyn ClientHandle>,
    ) -> ServerResult<()> {
        {
            let document = self.document.lock().await;
            if self.registry.find_by_name(name).await.is_some() {
                return Err(ServerError::NameTaken(name.to_string()));
            }
            self.registry
                .add(ClientSession::new(id, name, handle))
                .await?;
            info!(session = %id, name, "Client added");

            let snapshot = Update::Snapshot(document.snapshot());
            if !self.dispatcher.deliver_to(id, &snapshot).await {
                return Ok(());
            }
        }
        self.dispatcher
            .broadcast(&Update::PeerJoined(name.to_string()))
            .await;
        Ok(())
    }

    /// Unregister a client. Returns false if it was not registered.
    pub async fn remove_client(&self, id: SessionId) -> bool {
        match self.registry.remove(id).await {
            Some(session) => {
                info!(session = %id, name = %session.name, "Client removed");
                self.dispatcher.announce_departure(&session.name).await;
                true
            }
            None => false,
        }
    }

    /// Whether `id` is currently registered.
    pub async fn is_active(&self, id: SessionId) -> bool {
        self.registry.contains(id).await
    }

    /// Commit a shape and broadcast it. Returns its sequence number.
    pub async fn draw_shape(&self, shape: Shape, color: Rgb) -> ServerResult<u64> {
        let mut document = self.document.lock().await;
        let record = document.append_shape(shape, color)?;
        let seq = record.seq;
        debug!(seq, kind = %record.kind(), "Shape committed");
        self.dispatcher.broadcast(&Update::Shape(record)).await;
        Ok(seq)
    }

    /// Commit a text shape at `(x, y)` and broadcast it.
    pub async fn draw_text(&self, text: &str, x: f64, y: f64, color: Rgb) -> ServerResult<u64> {
        let shape = Shape::Text(Text::new(text, Point::new(x, y)));
        self.draw_shape(shape, color).await
    }

    /// Commit a chat message and broadcast it.
    pub async fn add_chat_message(&self, author: &str, text: &str) -> ServerResult<u64> {
        let mut document = self.document.lock().await;
        let message = document.append_chat(author, text)?;
        let seq = message.seq;
        debug!(seq, author, "Chat committed");
        self.dispatcher.broadcast(&Update::Chat(message)).await;
        Ok(seq)
    }

    /// Empty the drawing log everywhere. Chat is kept.
    pub async fn clear(&self) {
        let mut document = self.document.lock().await;
        document.clear();
        info!("Drawing log cleared");
        self.dispatcher.broadcast(&Update::Cleared).await;
    }

    /// Send the drawing log to one client.
    ///
    /// Queued under the document lock, so no shape committed after the copy
    /// can reach the client ahead of it.
    pub async fn send_drawings(&self, id: SessionId) -> bool {
        let document = self.document.lock().await;
        let update = Update::Drawings(document.drawings().to_vec());
        self.dispatcher.deliver_to(id, &update).await
    }

    /// Send the chat log to one client, queued under the document lock.
    pub async fn send_chat(&self, id: SessionId) -> bool {
        let document = self.document.lock().await;
        let update = Update::ChatLog(document.chat().to_vec());
        self.dispatcher.deliver_to(id, &update).await
    }

    pub async fn get_drawings(&self) -> Vec<ShapeRecord> {
        self.document.lock().await.drawings().to_vec()
    }

    pub async fn get_chat(&self) -> Vec<ChatMessage> {
        self.document.lock().await.chat().to_vec()
    }

    pub async fn snapshot(&self) -> DocumentSnapshot {
        self.document.lock().await.snapshot()
    }

    /// Registered display names in join order.
    pub async fn list_active(&self) -> Vec<String> {
        self.registry.list_active().await
    }

    /// Registered display names with time since joining.
    pub async fn roster(&self) -> Vec<(String, Duration)> {
        self.registry.roster().await
    }

    /// Remove a participant by name, telling it to close first.
    ///
    /// Returns false if nobody by that name is registered.
    pub async fn kick(&self, name: &str) -> bool {
        let Some(id) = self.registry.find_by_name(name).await else {
            return false;
        };
        info!(session = %id, name, "Kicking client");
        let farewell = [
            Update::Cleared,
            Update::Notice(REMOVED_NOTICE.to_string()),
            Update::Close,
        ];
        for update in &farewell {
            if !self.dispatcher.deliver_to(id, update).await {
                warn!(session = %id, name, "Kicked client stopped accepting messages");
                return true;
            }
        }
        self.remove_client(id).await;
        true
    }

    /// Send an operator notice to everyone. Returns the number reached.
    pub async fn broadcast_notice(&self, text: &str) -> usize {
        info!(text, "Broadcasting notice");
        self.dispatcher
            .broadcast(&Update::Notice(text.to_string()))
            .await
    }
}
