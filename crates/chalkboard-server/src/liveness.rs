//! Periodic liveness probing.
//!
//! Every `ping_interval` the monitor pings each registered session at once
//! and evicts the ones that answer `false`, fail, or stay silent past
//! `ping_timeout`.

use crate::dispatcher::BroadcastDispatcher;
use crate::registry::ClientRegistry;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, warn};

pub struct LivenessMonitor {
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    ping_interval: Duration,
    ping_timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(
        registry: Arc<ClientRegistry>,
        dispatcher: Arc<BroadcastDispatcher>,
        ping_interval: Duration,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            ping_interval,
            ping_timeout,
        }
    }

    /// Run probe rounds until the returned task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.ping_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.probe_once().await;
            }
        })
    }

    /// Ping every session once and evict the unresponsive ones.
    ///
    /// Returns the display names that were evicted.
    pub async fn probe_once(&self) -> Vec<String> {
        let targets = self.registry.probe_targets().await;
        if targets.is_empty() {
            return Vec::new();
        }

        let probes = targets.iter().map(|session| async move {
            let outcome = timeout(self.ping_timeout, session.handle.ping()).await;
            (session, outcome)
        });
        let results = join_all(probes).await;

        let mut evicted = Vec::new();
        for (session, outcome) in results {
            match outcome {
                Ok(Ok(true)) => continue,
                Ok(Ok(false)) => {
                    warn!(session = %session.id, name = %session.name, "Client reported not alive")
                }
                Ok(Err(e)) => {
                    warn!(session = %session.id, name = %session.name, error = %e, "Ping failed")
                }
                Err(_) => {
                    warn!(session = %session.id, name = %session.name, "Ping timed out")
                }
            }
            // Another path may have removed it while the round was running
            if let Some(removed) = self.registry.remove(session.id).await {
                self.dispatcher.announce_departure(&removed.name).await;
                evicted.push(removed.name);
            }
        }

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Liveness round evicted clients");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Update;
    use crate::session::testing::{RecordingHandle, session};

    fn monitor(timeout: Duration) -> (Arc<ClientRegistry>, LivenessMonitor) {
        let registry = Arc::new(ClientRegistry::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(Arc::clone(&registry)));
        let monitor = LivenessMonitor::new(
            Arc::clone(&registry),
            dispatcher,
            Duration::from_millis(20),
            timeout,
        );
        (registry, monitor)
    }

    #[tokio::test]
    async fn test_all_alive_keeps_everyone() {
        let (registry, monitor) = monitor(Duration::from_millis(100));
        let a = RecordingHandle::new();
        registry.add(session("A", &a)).await.unwrap();
        registry.add(session("B", &RecordingHandle::new())).await.unwrap();

        assert!(monitor.probe_once().await.is_empty());
        assert_eq!(registry.len().await, 2);
        assert_eq!(a.ping_count(), 1);
        assert!(a.updates().is_empty());
    }

    #[tokio::test]
    async fn test_not_alive_is_evicted() {
        let (registry, monitor) = monitor(Duration::from_millis(100));
        let a = RecordingHandle::new();
        let b = RecordingHandle::new();
        b.set_alive(false);
        registry.add(session("A", &a)).await.unwrap();
        registry.add(session("B", &b)).await.unwrap();

        assert_eq!(monitor.probe_once().await, vec!["B"]);
        assert_eq!(registry.list_active().await, vec!["A"]);
        assert_eq!(a.updates(), vec![Update::PeerLeft("B".into())]);
        assert!(b.updates().is_empty());
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let (registry, monitor) = monitor(Duration::from_millis(30));
        let slow = RecordingHandle::new();
        slow.set_hang_on_ping(true);
        registry.add(session("slow", &slow)).await.unwrap();
        registry.add(session("fast", &RecordingHandle::new())).await.unwrap();

        assert_eq!(monitor.probe_once().await, vec!["slow"]);
        assert_eq!(registry.list_active().await, vec!["fast"]);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let (_registry, monitor) = monitor(Duration::from_millis(30));
        assert!(monitor.probe_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_loop_evicts() {
        let (registry, monitor) = monitor(Duration::from_millis(30));
        let dead = RecordingHandle::new();
        dead.set_alive(false);
        registry.add(session("dead", &dead)).await.unwrap();

        let task = Arc::new(monitor).spawn();
        for _ in 0..50 {
            if registry.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(registry.is_empty().await);
    }
}
