//! Admission control for new participants.
//!
//! The operator joins without a prompt. Everyone else waits in line for a
//! single approval prompt, served in arrival order, and is denied if the
//! operator does not answer in time.

use crate::session::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Something that can accept or deny a candidate.
pub trait ApprovalSurface: Send + Sync {
    /// Resolve to true to admit `candidate`.
    fn decide<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool>;
}

/// A pending approval handed to whoever answers prompts.
#[derive(Debug)]
pub struct ApprovalRequest {
    candidate: String,
    reply: oneshot::Sender<bool>,
}

impl ApprovalRequest {
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// The gate stopped waiting for this answer.
    pub fn is_stale(&self) -> bool {
        self.reply.is_closed()
    }

    /// Resolves once the gate stops waiting for this answer.
    pub async fn expired(&mut self) {
        self.reply.closed().await
    }

    /// Answer the request. Returns false if the gate already gave up.
    pub fn respond(self, allowed: bool) -> bool {
        self.reply.send(allowed).is_ok()
    }
}

/// Approval surface backed by an mpsc channel of [`ApprovalRequest`]s.
#[derive(Debug, Clone)]
pub struct ChannelApproval {
    tx: mpsc::Sender<ApprovalRequest>,
}

impl ChannelApproval {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ApprovalRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ApprovalSurface for ChannelApproval {
    fn decide<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let (reply, answer) = oneshot::channel();
            let request = ApprovalRequest {
                candidate: candidate.to_string(),
                reply,
            };
            if self.tx.send(request).await.is_err() {
                warn!(candidate, "Approval surface is closed");
                return false;
            }
            answer.await.unwrap_or(false)
        })
    }
}

/// Decides who may join.
pub struct AdmissionGate {
    operator_name: String,
    surface: Arc<dyn ApprovalSurface>,
    timeout: Duration,
    /// Held for the duration of one prompt; tokio's mutex is FIFO.
    prompt: Mutex<()>,
}

impl AdmissionGate {
    pub fn new(
        operator_name: impl Into<String>,
        surface: Arc<dyn ApprovalSurface>,
        timeout: Duration,
    ) -> Self {
        Self {
            operator_name: operator_name.into(),
            surface,
            timeout,
            prompt: Mutex::new(()),
        }
    }

    /// Whether `candidate` may join.
    pub async fn request_connection(&self, candidate: &str) -> bool {
        if candidate.trim().is_empty() {
            debug!("Rejected blank display name");
            return false;
        }
        if candidate == self.operator_name {
            info!(candidate, "Operator admitted");
            return true;
        }

        let _turn = self.prompt.lock().await;
        debug!(candidate, "Asking operator");
        match tokio::time::timeout(self.timeout, self.surface.decide(candidate)).await {
            Ok(allowed) => {
                info!(candidate, allowed, "Admission decided");
                allowed
            }
            Err(_) => {
                warn!(candidate, timeout = ?self.timeout, "Admission timed out, denying");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every candidate the same way after a delay.
    struct Scripted {
        allow: bool,
        delay: Duration,
        calls: StdMutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Scripted {
        fn new(allow: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                allow,
                delay,
                calls: StdMutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    impl ApprovalSurface for Scripted {
        fn decide<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(candidate.to_string());
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.allow
            })
        }
    }

    #[tokio::test]
    async fn test_operator_bypasses_surface() {
        let surface = Scripted::new(false, Duration::ZERO);
        let gate = AdmissionGate::new("host", surface.clone(), Duration::from_secs(1));

        assert!(gate.request_connection("host").await);
        assert!(surface.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_surface_decides_others() {
        let deny = AdmissionGate::new("host", Scripted::new(false, Duration::ZERO), Duration::from_secs(1));
        assert!(!deny.request_connection("guest").await);

        let allow = AdmissionGate::new("host", Scripted::new(true, Duration::ZERO), Duration::from_secs(1));
        assert!(allow.request_connection("guest").await);
    }

    #[tokio::test]
    async fn test_blank_name_denied() {
        let surface = Scripted::new(true, Duration::ZERO);
        let gate = AdmissionGate::new("host", surface.clone(), Duration::from_secs(1));
        assert!(!gate.request_connection("   ").await);
        assert!(surface.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_denies() {
        let surface = Scripted::new(true, Duration::from_secs(10));
        let gate = AdmissionGate::new("host", surface, Duration::from_millis(50));
        assert!(!gate.request_connection("slow").await);
    }

    #[tokio::test]
    async fn test_prompts_are_serialized_in_arrival_order() {
        let surface = Scripted::new(true, Duration::from_millis(30));
        let gate = Arc::new(AdmissionGate::new("host", surface.clone(), Duration::from_secs(5)));

        let mut tasks = Vec::new();
        for name in ["c1", "c2", "c3", "c4"] {
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move { gate.request_connection(name).await }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(surface.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*surface.calls.lock().unwrap(), vec!["c1", "c2", "c3", "c4"]);
    }

    #[tokio::test]
    async fn test_channel_approval_round_trip() {
        let (approval, mut requests) = ChannelApproval::new(4);
        let gate = Arc::new(AdmissionGate::new("host", Arc::new(approval), Duration::from_secs(5)));

        let pending = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request_connection("guest").await })
        };
        let request = requests.recv().await.unwrap();
        assert_eq!(request.candidate(), "guest");
        assert!(!request.is_stale());
        assert!(request.respond(true));
        assert!(pending.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_request_denies() {
        let (approval, mut requests) = ChannelApproval::new(4);
        let gate = Arc::new(AdmissionGate::new("host", Arc::new(approval), Duration::from_secs(5)));

        let pending = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request_connection("guest").await })
        };
        drop(requests.recv().await.unwrap());
        assert!(!pending.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_channel_denies() {
        let (approval, requests) = ChannelApproval::new(4);
        drop(requests);
        let gate = AdmissionGate::new("host", Arc::new(approval), Duration::from_secs(5));
        assert!(!gate.request_connection("guest").await);
    }

    #[tokio::test]
    async fn test_stale_after_timeout() {
        let (approval, mut requests) = ChannelApproval::new(4);
        let gate = AdmissionGate::new("host", Arc::new(approval), Duration::from_millis(30));

        assert!(!gate.request_connection("guest").await);
        let request = requests.recv().await.unwrap();
        assert!(request.is_stale());
        assert!(!request.respond(true));
    }

    #[tokio::test]
    async fn test_expired_wakes_when_gate_gives_up() {
        let (approval, mut requests) = ChannelApproval::new(4);
        let gate = Arc::new(AdmissionGate::new("host", Arc::new(approval), Duration::from_millis(50)));

        let pending = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request_connection("guest").await })
        };
        let mut request = requests.recv().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), request.expired())
            .await
            .unwrap();
        assert!(request.is_stale());
        assert!(!pending.await.unwrap());
    }
}
