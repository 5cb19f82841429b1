//! Client sessions and the handle the engine talks to them through.
//!
//! The engine never touches a socket. Each registered participant is a
//! [`ClientSession`] wrapping an `Arc<dyn ClientHandle>`, which the
//! WebSocket layer implements over a bounded outbound queue and tests
//! implement with recording doubles.

use crate::dispatcher::Update;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Identity of one connection. Minted fresh for every socket.
pub type SessionId = Uuid;

/// Boxed future returned by object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why an update or probe could not reach a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("client disconnected")]
    Disconnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Server-side view of a connected participant.
pub trait ClientHandle: Send + Sync {
    /// Hand an update to the client without blocking.
    fn deliver(&self, update: &Update) -> Result<(), DeliveryError>;

    /// Ask the client whether it is still alive.
    fn ping(&self) -> BoxFuture<'_, Result<bool, DeliveryError>>;
}

/// A registered participant.
#[derive(Clone)]
pub struct ClientSession {
    pub id: SessionId,
    pub name: String,
    pub handle: Arc<dyn ClientHandle>,
    pub joined_at: Instant,
}

impl ClientSession {
    pub fn new(id: SessionId, name: impl Into<String>, handle: Arc<dyn ClientHandle>) -> Self {
        Self {
            id,
            name: name.into(),
            handle,
            joined_at: Instant::now(),
        }
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("joined_at", &self.joined_at)
            .finish_non_exhaustive()
    }
}
