//! Status indicators.
//!
//! Two lamps: one lit while a session is up, one toggled for every record
//! received from the network.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

/// Sink for link and activity status.
pub trait StatusIndicator: Send + Sync {
    /// Light or clear the link lamp.
    fn set_link(&self, on: bool);

    /// Flip the activity lamp.
    fn toggle_activity(&self);
}

/// Indicator that keeps lamp state in memory and reports changes to the log.
#[derive(Debug, Default)]
pub struct LogIndicator {
    link: AtomicBool,
    activity: AtomicBool,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_on(&self) -> bool {
        self.link.load(Ordering::Relaxed)
    }

    pub fn activity_on(&self) -> bool {
        self.activity.load(Ordering::Relaxed)
    }
}

impl StatusIndicator for LogIndicator {
    fn set_link(&self, on: bool) {
        if self.link.swap(on, Ordering::Relaxed) != on {
            debug!(on, "Link indicator");
        }
    }

    fn toggle_activity(&self) {
        let on = !self.activity.fetch_xor(true, Ordering::Relaxed);
        trace!(on, "Activity indicator");
    }
}
