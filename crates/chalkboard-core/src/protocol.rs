//! Wire protocol between whiteboard clients and the server.
//!
//! Messages are JSON text frames tagged by `type`:
//! ```json
//! { "type": "request_connection", "name": "alice" }
//! { "type": "draw_shape", "shape": { "kind": "line", "start": { "x": 10, "y": 10 }, "end": { "x": 50, "y": 50 } }, "color": { "r": 0, "g": 0, "b": 0 } }
//! { "type": "pong", "nonce": 7, "alive": true }
//! ```

use crate::chat::ChatMessage;
use crate::shapes::{Rgb, Shape, ShapeRecord};
use serde::{Deserialize, Serialize};

/// Notice text telling a client it was removed and should close.
pub const REMOVED_NOTICE: &str = "You have been removed from the server";

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to join under a display name
    RequestConnection { name: String },
    /// Register this connection after approval
    AddClient,
    /// Leave the whiteboard
    RemoveClient,
    /// Draw a line, circle, oval or rectangle
    DrawShape { shape: Shape, color: Rgb },
    /// Draw text at a baseline position
    DrawText { text: String, x: f64, y: f64, color: Rgb },
    /// Post a chat message as the registered name
    Chat { text: String },
    /// Empty the drawing log
    Clear,
    /// Request the drawing log
    GetDrawings,
    /// Request the chat log
    GetChat,
    /// Answer to a liveness probe
    Pong { nonce: u64, alive: bool },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Outcome of a connection request
    ConnectionDecision { allowed: bool },
    /// A single newly committed shape
    Draw { shape: ShapeRecord },
    /// Replace the canvas with this drawing log
    RenderDrawings { shapes: Vec<ShapeRecord> },
    /// Replace the transcript with this chat log
    RenderChatMessages { messages: Vec<ChatMessage> },
    /// A single newly committed chat message
    ChatMessage { message: ChatMessage },
    /// Informational notice; `REMOVED_NOTICE` means close
    Notice { text: String },
    /// The drawing log was cleared
    Clear,
    /// The client must shut down
    CloseApplication,
    /// Liveness probe
    Ping { nonce: u64 },
    /// A participant joined
    PeerJoined { name: String },
    /// A participant left or was evicted
    PeerLeft { name: String },
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    /// Whether this message tells the client to close.
    pub fn is_terminal(&self) -> bool {
        match self {
            ServerMessage::CloseApplication => true,
            ServerMessage::Notice { text } => text == REMOVED_NOTICE,
            _ => false,
        }
    }
}
