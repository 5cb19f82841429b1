//! Chat log entries.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A chat message committed to the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Position in the chat log, assigned at append time.
    pub seq: u64,
    pub author: String,
    pub text: String,
    /// Server time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl ChatMessage {
    /// Line as shown in a transcript, e.g. `"A: hi"`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.author, self.text)
    }
}

/// Current wall-clock time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
