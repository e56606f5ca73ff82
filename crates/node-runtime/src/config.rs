//! # Node Configuration
//!
//! Host configuration plus the requester and replier configuration it hands
//! to the correlation engine.
//!
//! ## Invariants
//!
//! - `bus_capacity` is never zero (a zero-capacity broadcast channel cannot
//!   be created)

use reqrep_core::{ReplierConfig, RequesterConfig};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Deadline the demo applies when `REQREP_REQUEST_TIMEOUT_MS` is unset.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Name reported in the startup banner.
    pub service_name: String,
    /// `EnvFilter` directive.
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
    /// Per-subscriber buffer of each in-memory bus.
    pub bus_capacity: usize,
    /// Requester configuration.
    pub requester: RequesterConfig,
    /// Replier configuration.
    pub replier: ReplierConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            service_name: "reqrep-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            requester: RequesterConfig::default().with_request_timeout(DEFAULT_REQUEST_TIMEOUT),
            replier: ReplierConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REQREP_SERVICE_NAME`: banner name (default: reqrep-node)
    /// - `REQREP_LOG_LEVEL` or `RUST_LOG`: log filter (default: info)
    /// - `REQREP_JSON_LOGS`: JSON log output (default: false)
    /// - `REQREP_BUS_CAPACITY`: per-subscriber buffer (default: 1000)
    /// - `REQREP_REQUEST_TIMEOUT_MS`: request deadline (default: 5000, `0`
    ///   waits indefinitely)
    /// - `REQREP_DISPATCH`: `sequential` or `concurrent` (default: sequential)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let requester = match lookup("REQREP_REQUEST_TIMEOUT_MS") {
            Some(_) => RequesterConfig::from_lookup(&lookup),
            None => defaults.requester,
        };

        Self {
            service_name: lookup("REQREP_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("REQREP_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("REQREP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),

            bus_capacity: lookup("REQREP_BUS_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.bus_capacity),

            requester,
            replier: ReplierConfig::from_lookup(&lookup),
        }
    }

    /// Reject configuration the host cannot run with.
    ///
    /// # Errors
    ///
    /// `ConfigError::ZeroBusCapacity` if `bus_capacity` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus_capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Bus capacity must be at least one message.
    #[error("bus capacity must be greater than zero (REQREP_BUS_CAPACITY)")]
    ZeroBusCapacity,
}
