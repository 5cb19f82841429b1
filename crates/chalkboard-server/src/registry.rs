//! The set of registered participants.
//!
//! Sessions are kept in join order behind one async mutex. Fan-out runs
//! under that same lock and evicts failing sessions before releasing it,
//! so no removal can interleave with a broadcast in progress.

use crate::dispatcher::Update;
use crate::session::{ClientSession, DeliveryError, SessionId};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Registry contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session {0} is already registered")]
    DuplicateHandle(SessionId),
}

/// Result of delivering one update to every session.
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    pub delivered: usize,
    pub evicted: Vec<ClientSession>,
}

/// Result of delivering to a single session.
#[derive(Debug)]
pub(crate) enum Targeted {
    Delivered,
    Missing,
    Evicted(ClientSession, DeliveryError),
}

/// Active sessions in join order.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: Mutex<Vec<ClientSession>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Fails if its id is already present.
    pub async fn add(&self, session: ClientSession) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.iter().any(|s| s.id == session.id) {
            return Err(RegistryError::DuplicateHandle(session.id));
        }
        sessions.push(session);
        Ok(())
    }

    /// Remove a session by id. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: SessionId) -> Option<ClientSession> {
        let mut sessions = self.sessions.lock().await;
        let index = sessions.iter().position(|s| s.id == id)?;
        Some(sessions.remove(index))
    }

    /// Display names in join order.
    pub async fn list_active(&self) -> Vec<String> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Display names in join order, each with how long it has been registered.
    pub async fn roster(&self) -> Vec<(String, Duration)> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(|s| (s.name.clone(), s.joined_at.elapsed()))
            .collect()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<SessionId> {
        self.sessions
            .lock()
            .await
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.id)
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().await.iter().any(|s| s.id == id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Copy of the current sessions for one liveness round.
    pub(crate) async fn probe_targets(&self) -> Vec<ClientSession> {
        self.sessions.lock().await.clone()
    }

    /// Deliver to every session in join order, evicting the ones that fail.
    pub(crate) async fn deliver_all(&self, update: &Update) -> FanOut {
        let mut sessions = self.sessions.lock().await;
        let mut fan_out = FanOut::default();
        sessions.retain(|session| match session.handle.deliver(update) {
            Ok(()) => {
                fan_out.delivered += 1;
                true
            }
            Err(e) => {
                warn!(session = %session.id, name = %session.name, error = %e, "Delivery failed");
                fan_out.evicted.push(session.clone());
                false
            }
        });
        fan_out
    }

    /// Deliver to one session, evicting it on failure.
    pub(crate) async fn deliver_to(&self, id: SessionId, update: &Update) -> Targeted {
        let mut sessions = self.sessions.lock().await;
        let Some(index) = sessions.iter().position(|s| s.id == id) else {
            return Targeted::Missing;
        };
        match sessions[index].handle.deliver(update) {
            Ok(()) => Targeted::Delivered,
            Err(e) => {
                let session = sessions.remove(index);
                warn!(session = %session.id, name = %session.name, error = %e, "Delivery failed");
                Targeted::Evicted(session, e)
            }
        }
    }
}
