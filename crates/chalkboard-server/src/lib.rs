//! Chalkboard Server
//!
//! Authoritative synchronization for a shared whiteboard: one document,
//! admission by an operator, ordered fan-out to every participant, and
//! eviction of clients that stop answering.

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod liveness;
pub mod operator;
pub mod registry;
pub mod server;
pub mod session;
pub mod ws;

pub use admission::{AdmissionGate, ApprovalRequest, ApprovalSurface, ChannelApproval};
pub use config::ServerConfig;
pub use dispatcher::{BroadcastDispatcher, Update};
pub use error::{ServerError, ServerResult};
pub use liveness::LivenessMonitor;
pub use registry::{ClientRegistry, RegistryError};
pub use server::WhiteboardServer;
pub use session::{BoxFuture, ClientHandle, ClientSession, DeliveryError, SessionId};
pub use ws::{SocketHandle, router};
