//! Link configuration.

use crate::registry::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_wait_timeout_ms() -> u64 {
    5000
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_compression_threshold() -> usize {
    1024
}

fn default_diagnostics_capacity() -> usize {
    256
}

fn default_max_ready_slots() -> usize {
    1024
}

/// Settings for a [`RemotingLink`](crate::link::RemotingLink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotingConfig {
    /// Timeout for awaited calls and `remote_wait` without an explicit one
    #[serde(default = "default_wait_timeout_ms")]
    pub default_wait_timeout_ms: u64,
    /// What the registry does when an id is registered twice
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Inbound frames above this size are dropped unparsed
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Deflate-frame messages; both ends must agree
    #[serde(default)]
    pub enable_compression: bool,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Buffer of the diagnostics broadcast channel
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
    /// Published slot values kept per instance until claimed; each expires
    /// after the default wait timeout
    #[serde(default = "default_max_ready_slots")]
    pub max_ready_slots: usize,
    /// Trace-log message bodies in both directions
    #[serde(default)]
    pub log_payloads: bool,
}

impl Default for RemotingConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout_ms: default_wait_timeout_ms(),
            duplicate_policy: DuplicatePolicy::default(),
            max_message_size: default_max_message_size(),
            enable_compression: false,
            compression_threshold: default_compression_threshold(),
            diagnostics_capacity: default_diagnostics_capacity(),
            max_ready_slots: default_max_ready_slots(),
            log_payloads: false,
        }
    }
}

impl RemotingConfig {
    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_wait_timeout_ms == 0 {
            return Err("default_wait_timeout_ms must be greater than 0".to_string());
        }

        if self.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }

        if self.diagnostics_capacity == 0 {
            return Err("diagnostics_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}
