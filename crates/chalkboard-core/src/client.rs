//! Native WebSocket connector for whiteboard clients.
//!
//! Runs the socket on a background thread so a UI loop can stay
//! non-blocking: messages go in through [`WhiteboardClient::send`] and
//! server traffic comes back out of [`WhiteboardClient::poll_events`].
//! Liveness probes are answered on the socket thread and never surface.

use crate::protocol::{ClientMessage, ServerMessage};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tungstenite::{connect, Message};
use url::Url;

/// Connector errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection thread has stopped")]
    ChannelClosed,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the connection thread
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Socket handshake completed
    Connected,
    /// Socket closed, by either side
    Disconnected,
    /// A message from the server
    Message(ServerMessage),
    /// Error occurred
    Error { message: String },
}

/// Commands sent to the connection thread.
enum Command {
    Send(String),
    Close,
}

/// Build the server endpoint URL from a host and port.
pub fn endpoint_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}/ws")
}

/// Blocking-free whiteboard connection.
pub struct WhiteboardClient {
    state: ConnectionState,
    events: Vec<ClientEvent>,
    cmd_tx: Option<Sender<Command>>,
    event_rx: Option<Receiver<ClientEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl WhiteboardClient {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to a whiteboard server.
    pub fn connect(&mut self, url: &str) -> Result<(), ClientError> {
        if self.cmd_tx.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let parsed = Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<Command>();
        let (event_tx, event_rx) = channel::<ClientEvent>();
        let url = parsed.to_string();

        let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);
        Ok(())
    }

    /// Disconnect from the server.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Queue a message for the server.
    pub fn send(&self, msg: &ClientMessage) -> Result<(), ClientError> {
        let tx = self.cmd_tx.as_ref().ok_or(ClientError::NotConnected)?;
        let json = serde_json::to_string(msg)?;
        tx.send(Command::Send(json))
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<ClientEvent> {
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    ClientEvent::Connected => self.state = ConnectionState::Connected,
                    ClientEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    ClientEvent::Error { .. } => self.state = ConnectionState::Error,
                    ClientEvent::Message(_) => {}
                }
                self.events.push(event);
            }
        }

        std::mem::take(&mut self.events)
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for WhiteboardClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WhiteboardClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// At most `max_chars` characters of `msg`, for log lines.
fn preview(msg: &str, max_chars: usize) -> &str {
    msg.char_indices()
        .nth(max_chars)
        .map_or(msg, |(end, _)| &msg[..end])
}

/// Socket thread body.
fn run_socket(url: &str, cmd_rx: Receiver<Command>, event_tx: Sender<ClientEvent>) {
    log::info!("Connecting to {}", url);

    let (mut socket, response) = match connect(url) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Connection failed: {}", e);
            let _ = event_tx.send(ClientEvent::Error {
                message: format!("Connection failed: {}", e),
            });
            return;
        }
    };
    log::info!("Connected, status: {}", response.status());
    let _ = event_tx.send(ClientEvent::Connected);

    // Short read timeout turns the blocking read into a poll
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(Command::Send(msg)) => {
                log::debug!("Sending: {}", preview(&msg, 100));
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("Send error: {}", e);
                    break;
                }
            }
            Ok(Command::Close) => {
                log::info!("Close requested");
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                let msg = match serde_json::from_str::<ServerMessage>(&txt) {
                    Ok(msg) => msg,
                    Err(e) => {
                        log::warn!("Failed to parse server message: {}", e);
                        continue;
                    }
                };
                if let ServerMessage::Ping { nonce } = msg {
                    let pong = ClientMessage::Pong { nonce, alive: true };
                    if let Ok(json) = serde_json::to_string(&pong) {
                        if let Err(e) = socket.send(Message::Text(json)) {
                            log::error!("Pong failed: {}", e);
                            break;
                        }
                    }
                    continue;
                }
                let terminal = msg.is_terminal();
                if event_tx.send(ClientEvent::Message(msg)).is_err() {
                    break;
                }
                if terminal {
                    log::info!("Server asked the client to close");
                    let _ = socket.close(None);
                    break;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("Received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("Read error: {}", e);
                break;
            }
        }
    }

    log::info!("Connection thread exiting");
    let _ = event_tx.send(ClientEvent::Disconnected);
}
