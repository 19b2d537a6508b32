//! Process-wide mode flags shared by every bridge worker.
//!
//! A single [`BridgeContext`] is created at startup and handed to each worker
//! when it is spawned. Flags are plain booleans with last-write-wins
//! semantics; readers must tolerate them changing at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::logging::LogGate;

/// Shared mode flags.
#[derive(Debug)]
pub struct BridgeContext {
    /// One-way reset signal. Cancelled exactly once, never re-armed.
    resetting: CancellationToken,
    /// Closed while the operator is editing configuration.
    configuration_mode: LogGate,
    /// Verbose echo of relayed lines.
    log_msgs: AtomicBool,
    /// Process start, for uptime reporting.
    started_at: Instant,
}

impl BridgeContext {
    /// Create a context with all flags cleared.
    pub fn new() -> Self {
        Self::with_log_gate(LogGate::new())
    }

    /// Create a context whose configuration mode drives the given log gate.
    pub fn with_log_gate(gate: LogGate) -> Self {
        gate.open();
        Self {
            resetting: CancellationToken::new(),
            configuration_mode: gate,
            log_msgs: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Whether a reset is in progress.
    pub fn is_resetting(&self) -> bool {
        self.resetting.is_cancelled()
    }

    /// Flag the bridge as resetting. Idempotent.
    pub fn begin_reset(&self) {
        self.resetting.cancel();
    }

    /// Completes once the bridge starts resetting.
    pub async fn reset_started(&self) {
        self.resetting.cancelled().await
    }

    /// Whether the operator is editing configuration.
    pub fn configuration_mode(&self) -> bool {
        self.configuration_mode.is_closed()
    }

    /// Enter or leave configuration mode. Logging is silenced while inside.
    pub fn set_configuration_mode(&self, enabled: bool) {
        if enabled {
            self.configuration_mode.close();
        } else {
            self.configuration_mode.open();
        }
    }

    /// Whether relayed lines are echoed to the log.
    pub fn log_msgs(&self) -> bool {
        self.log_msgs.load(Ordering::Relaxed)
    }

    /// Flip verbose echo and return the new value.
    pub fn toggle_log_msgs(&self) -> bool {
        !self.log_msgs.fetch_xor(true, Ordering::Relaxed)
    }

    /// Time since the context was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}
