//! Software watchdog.
//!
//! The supervisory loop feeds the watchdog at a fixed interval. If feeding
//! stops for longer than the timeout the monitor restarts the process,
//! regardless of configuration mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::context::BridgeContext;
use crate::fault::{Restarter, StartReason};

#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    last_fed: Mutex<Instant>,
    starved: AtomicBool,
}

impl Watchdog {
    /// Create a watchdog that counts from now.
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            last_fed: Mutex::new(Instant::now()),
            starved: AtomicBool::new(false),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the countdown. Ignored once starved.
    pub fn feed(&self) {
        if self.starved.load(Ordering::Relaxed) {
            return;
        }
        *self.last_fed.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Stop accepting feeds so the watchdog expires.
    pub fn starve(&self) {
        warn!("Watchdog starved");
        self.starved.store(true, Ordering::Relaxed);
    }

    pub fn is_starved(&self) -> bool {
        self.starved.load(Ordering::Relaxed)
    }

    /// Whether the timeout has elapsed since the last feed.
    pub fn expired(&self) -> bool {
        self.last_fed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
            > self.timeout
    }

    /// Watch for expiry and restart the process when it happens.
    pub async fn monitor(self: Arc<Self>, restarter: Arc<dyn Restarter>) {
        let mut tick = tokio::time::interval(self.timeout / 4);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if self.expired() {
                break;
            }
        }

        error!(timeout_ms = self.timeout.as_millis() as u64, "Watchdog expired");
        if let Err(e) = restarter.restart(StartReason::Watchdog) {
            error!(error = %e, "Watchdog restart failed");
        }
    }

    /// Feed at `interval` until the bridge starts resetting.
    pub async fn feed_loop(self: Arc<Self>, interval: Duration, ctx: Arc<BridgeContext>) {
        let mut tick = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = ctx.reset_started() => break,
                _ = tick.tick() => self.feed(),
            }
        }
        debug!("Watchdog feeding stopped");
    }
}
