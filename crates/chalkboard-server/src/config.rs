//! Server configuration.

use crate::error::{ServerError, ServerResult};
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Runtime settings for a whiteboard server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Display name of the operator. Joining under it skips approval.
    pub operator_name: String,
    /// Time between liveness rounds.
    pub ping_interval: Duration,
    /// How long a single ping may take before the client is evicted.
    pub ping_timeout: Duration,
    /// How long a candidate waits for the operator before being denied.
    pub admission_timeout: Duration,
    /// Outbound messages buffered per client before it is disconnected.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            operator_name: String::new(),
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Default settings for the given operator.
    pub fn new(operator_name: impl Into<String>) -> Self {
        Self {
            operator_name: operator_name.into(),
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> ServerResult<()> {
        if self.operator_name.trim().is_empty() {
            return Err(ServerError::Config("operator name must not be empty".into()));
        }
        if self.ping_interval.is_zero() {
            return Err(ServerError::Config("ping interval must be positive".into()));
        }
        if self.ping_timeout.is_zero() {
            return Err(ServerError::Config("ping timeout must be positive".into()));
        }
        if self.admission_timeout.is_zero() {
            return Err(ServerError::Config("admission timeout must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ServerError::Config("queue capacity must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new("host");
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 3030);
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.ping_timeout, Duration::from_secs(3));
        assert_eq!(config.admission_timeout, Duration::from_secs(60));
        assert_eq!(config.queue_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_operator_rejected() {
        let config = ServerConfig::new("  ");
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_zero_values_rejected() {
        let base = ServerConfig::new("host");

        let config = ServerConfig {
            ping_interval: Duration::ZERO,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            ping_timeout: Duration::ZERO,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            admission_timeout: Duration::ZERO,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            queue_capacity: 0,
            ..base
        };
        assert!(config.validate().is_err());
    }
}
