//! Session configuration.

use std::time::Duration;

use crate::constants::RECONNECT_DELAY;

/// What to do when a connect attempt fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectPolicy {
    /// Hand the failure to the fault handler, which restarts the bridge.
    #[default]
    Reset,
    /// Sleep and try again, indefinitely.
    Retry { delay: Duration },
}

impl ConnectPolicy {
    /// Retry with the default delay.
    pub fn retry() -> Self {
        ConnectPolicy::Retry {
            delay: RECONNECT_DELAY,
        }
    }
}

/// Session controller configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Connect failure handling.
    pub connect_policy: ConnectPolicy,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect failure policy.
    pub fn with_connect_policy(mut self, policy: ConnectPolicy) -> Self {
        self.connect_policy = policy;
        self
    }
}
