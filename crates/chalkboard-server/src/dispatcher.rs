//! Fan-out of committed changes to registered sessions.

use crate::registry::{ClientRegistry, Targeted};
use crate::session::{ClientSession, SessionId};
use chalkboard_core::{ChatMessage, DocumentSnapshot, ShapeRecord};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// A change pushed to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Full state for a client that just joined
    Snapshot(DocumentSnapshot),
    /// One newly committed shape
    Shape(ShapeRecord),
    /// Full drawing log, sent on request
    Drawings(Vec<ShapeRecord>),
    /// Full chat log, sent on request
    ChatLog(Vec<ChatMessage>),
    /// The drawing log was emptied
    Cleared,
    /// One newly committed chat message
    Chat(ChatMessage),
    /// Operator notice
    Notice(String),
    PeerJoined(String),
    PeerLeft(String),
    /// The client must shut down
    Close,
}

/// Delivers updates through the registry and announces evictions.
#[derive(Debug)]
pub struct BroadcastDispatcher {
    registry: Arc<ClientRegistry>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `update` to every active session in join order.
    ///
    /// Returns how many sessions accepted it. Sessions that fail are
    /// evicted and announced with `PeerLeft` to the rest.
    pub async fn broadcast(&self, update: &Update) -> usize {
        let fan_out = self.registry.deliver_all(update).await;
        self.settle(fan_out.evicted).await;
        fan_out.delivered
    }

    /// Deliver `update` to one session. Returns false if it is gone or
    /// was evicted by this delivery.
    pub async fn deliver_to(&self, id: SessionId, update: &Update) -> bool {
        match self.registry.deliver_to(id, update).await {
            Targeted::Delivered => true,
            Targeted::Missing => {
                debug!(session = %id, "Targeted delivery to unknown session");
                false
            }
            Targeted::Evicted(session, e) => {
                debug!(session = %id, error = %e, "Targeted delivery failed");
                self.settle(vec![session]).await;
                false
            }
        }
    }

    /// Tell every remaining session that `name` has left.
    pub async fn announce_departure(&self, name: &str) {
        self.broadcast(&Update::PeerLeft(name.to_string())).await;
    }

    /// Announce evictions until no announcement evicts anyone else.
    async fn settle(&self, evicted: Vec<ClientSession>) {
        let mut departed: VecDeque<ClientSession> = evicted.into();
        while let Some(session) = departed.pop_front() {
            info!(session = %session.id, name = %session.name, "Evicted after failed delivery");
            let fan_out = self
                .registry
                .deliver_all(&Update::PeerLeft(session.name.clone()))
                .await;
            departed.extend(fan_out.evicted);
        }
    }
}
