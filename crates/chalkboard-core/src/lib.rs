//! Chalkboard Core Library
//!
//! Value types, the authoritative document, the wire protocol and the
//! native client connector for the Chalkboard shared whiteboard.

pub mod chat;
pub mod client;
pub mod document;
pub mod protocol;
pub mod shapes;
pub mod storage;

pub use chat::ChatMessage;
pub use client::{ClientError, ClientEvent, ConnectionState, WhiteboardClient, endpoint_url};
pub use document::{DocumentError, DocumentSnapshot, SharedDocument};
pub use protocol::{ClientMessage, REMOVED_NOTICE, ServerMessage};
pub use shapes::{Circle, Geometry, Line, Oval, Rectangle, Rgb, Shape, ShapeError, ShapeKind, ShapeRecord, Text};
pub use storage::{StorageError, load_from_path, read_records, save_to_path, write_records};
