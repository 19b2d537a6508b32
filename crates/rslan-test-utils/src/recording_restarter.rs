//! Restarter that records requests instead of restarting.

use std::sync::Mutex;

use tokio::sync::Notify;

use rslan_core::error::{Error, Result};
use rslan_core::fault::{Restarter, StartReason};

#[derive(Debug, Default)]
pub struct RecordingRestarter {
    reasons: Mutex<Vec<StartReason>>,
    notify: Notify,
}

impl RecordingRestarter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reasons of every restart request so far.
    pub fn reasons(&self) -> Vec<StartReason> {
        self.reasons.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.reasons.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait until at least one restart has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count() > 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Restarter for RecordingRestarter {
    fn restart(&self, reason: StartReason) -> Result<()> {
        self.reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reason);
        self.notify.notify_waiters();
        Err(Error::config("restart recorded"))
    }
}
