//! The authoritative whiteboard document.
//!
//! `SharedDocument` holds the drawing log and the chat log. It performs no
//! locking itself: the server owns exactly one instance behind a mutex, and
//! every mutation goes through that lock, which is what makes the order of
//! both logs global.

use crate::chat::{now_millis, ChatMessage};
use crate::shapes::{Rgb, Shape, ShapeError, ShapeRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from document mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),
    #[error("chat message is empty")]
    EmptyChat,
}

/// A point-in-time copy of both logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub shapes: Vec<ShapeRecord>,
    pub chat: Vec<ChatMessage>,
}

/// Ordered drawing and chat logs with their sequence counters.
#[derive(Debug, Default)]
pub struct SharedDocument {
    shapes: Vec<ShapeRecord>,
    chat: Vec<ChatMessage>,
    /// Last sequence number handed out to a shape. Survives `clear`.
    last_shape_seq: u64,
    /// Last sequence number handed out to a chat message.
    last_chat_seq: u64,
}

impl SharedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a shape, returning the committed record.
    pub fn append_shape(&mut self, shape: Shape, color: Rgb) -> Result<ShapeRecord, DocumentError> {
        shape.validate()?;
        let seq = self.last_shape_seq + 1;
        debug_assert!(
            self.shapes.last().is_none_or(|last| last.seq < seq),
            "shape sequence must be strictly increasing"
        );
        self.last_shape_seq = seq;

        let record = ShapeRecord { seq, shape, color };
        self.shapes.push(record.clone());
        Ok(record)
    }

    /// Append a chat message stamped with the server clock.
    pub fn append_chat(&mut self, author: &str, text: &str) -> Result<ChatMessage, DocumentError> {
        self.append_chat_at(author, text, now_millis())
    }

    /// Append a chat message with an explicit clock reading.
    ///
    /// Timestamps never go backwards along the log, even if the wall clock does.
    pub fn append_chat_at(
        &mut self,
        author: &str,
        text: &str,
        now_ms: u64,
    ) -> Result<ChatMessage, DocumentError> {
        if text.trim().is_empty() {
            return Err(DocumentError::EmptyChat);
        }
        let timestamp_ms = self
            .chat
            .last()
            .map_or(now_ms, |last| now_ms.max(last.timestamp_ms));
        let seq = self.last_chat_seq + 1;
        debug_assert!(
            self.chat.last().is_none_or(|last| last.seq < seq),
            "chat sequence must be strictly increasing"
        );
        self.last_chat_seq = seq;

        let message = ChatMessage {
            seq,
            author: author.to_string(),
            text: text.to_string(),
            timestamp_ms,
        };
        self.chat.push(message.clone());
        Ok(message)
    }

    /// Empty the drawing log. The chat log is untouched.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Owned copy of both logs.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            shapes: self.shapes.clone(),
            chat: self.chat.clone(),
        }
    }

    pub fn drawings(&self) -> &[ShapeRecord] {
        &self.shapes
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.chat.is_empty()
    }
}
