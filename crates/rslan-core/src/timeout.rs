//! Response timeout supervision.
//!
//! After a reply-expected command is forwarded the timer is armed; the first
//! record from the network cancels it. If it expires first, a single
//! notification is queued for the responder, which writes `TIMEOUT` to the
//! instrument. Arming again restarts the countdown.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct TimerSlot {
    /// Bumped on every arm and cancel; a waking timer compares against it.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Single one-shot timer shared between the relay workers.
#[derive(Debug)]
pub struct ResponseTimeout {
    interval: Duration,
    slot: Mutex<TimerSlot>,
    fired: mpsc::Sender<()>,
}

/// Receiving end of expiry notifications.
#[derive(Debug)]
pub struct TimeoutEvents {
    rx: mpsc::Receiver<()>,
}

impl TimeoutEvents {
    /// Wait for the next expiry. `None` once the timer is gone.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl ResponseTimeout {
    /// Create a disarmed timer.
    pub fn new(interval: Duration) -> (Arc<Self>, TimeoutEvents) {
        // Capacity 1: at most one expiry is ever outstanding.
        let (fired, rx) = mpsc::channel(1);
        let timeout = Arc::new(Self {
            interval,
            slot: Mutex::new(TimerSlot::default()),
            fired,
        });
        (timeout, TimeoutEvents { rx })
    }

    /// Configured expiry interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the countdown, replacing any running one.
    pub fn arm(self: &Arc<Self>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.generation = slot.generation.wrapping_add(1);

        let generation = slot.generation;
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.interval;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(timeout) = weak.upgrade() {
                timeout.expire(generation);
            }
        }));
        trace!(generation, "Response timer armed");
    }

    /// Stop the countdown. Returns whether it was running.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.timer.take() {
            Some(timer) => {
                timer.abort();
                slot.generation = slot.generation.wrapping_add(1);
                trace!("Response timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a countdown is running.
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timer
            .is_some()
    }

    fn expire(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.generation != generation || slot.timer.is_none() {
            // Lost the race against cancel or re-arm.
            return;
        }
        slot.timer = None;

        match self.fired.try_send(()) {
            Ok(()) => debug!("Response timeout expired"),
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Response timeout already pending");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                trace!("Response timeout has no listener");
            }
        }
    }
}

impl Drop for ResponseTimeout {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }
}
