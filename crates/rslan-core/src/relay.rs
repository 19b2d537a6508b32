//! Bridge workers.
//!
//! Each function is the body of one long-running task. They stop once the
//! bridge starts resetting.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::channel::LineSource;
use crate::constants::{MSG_DISCONNECTED, MSG_TIMEOUT};
use crate::error::Error;
use crate::timeout::TimeoutEvents;

/// Forward instrument commands to the peer.
///
/// Without a session every record is answered with `DISCONNECTED` and
/// dropped. A failed network write is only logged; the other relay notices
/// the broken session. Reply-expected commands arm the response timer once
/// they have been written.
pub async fn serial_to_network(bridge: Arc<Bridge>, mut source: Box<dyn LineSource>) {
    let ctx = bridge.context().clone();

    while !ctx.is_resetting() {
        let read = tokio::select! {
            biased;
            _ = ctx.reset_started() => break,
            read = source.read_line() => read,
        };

        let line = match read {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to read from serial");
                bridge.escalate("serial read failed").await;
                continue;
            }
        };

        if ctx.log_msgs() {
            info!(len = line.len(), %line, "Serial rx");
        }

        if !bridge.session().is_active() {
            bridge.notify_serial(MSG_DISCONNECTED).await;
            continue;
        }

        match bridge.session().send(line.as_bytes()).await {
            Ok(()) => {
                if bridge.config().expects_reply(line.as_bytes()) {
                    bridge.timeout().arm();
                }
            }
            Err(e) => warn!(error = %e, "Failed to send to network"),
        }
    }

    debug!("Serial relay stopped");
}

/// Forward peer replies to the instrument, keeping a session up.
///
/// Any received record cancels the response timer. A failed read ends the
/// session; the next iteration reconnects.
pub async fn network_to_serial(bridge: Arc<Bridge>) {
    let ctx = bridge.context().clone();
    let session = bridge.session().clone();

    while !ctx.is_resetting() {
        if !session.is_active() {
            match session.connect().await {
                Ok(()) => {}
                Err(Error::Shutdown) => break,
                Err(e) => {
                    error!(error = %e, "Connection failed");
                    bridge.escalate("connect failed").await;
                    continue;
                }
            }
        }

        let read = tokio::select! {
            biased;
            _ = ctx.reset_started() => break,
            read = session.recv() => read,
        };

        match read {
            Ok(line) => {
                bridge.timeout().cancel();
                bridge.indicator().toggle_activity();
                if ctx.log_msgs() {
                    info!(len = line.len(), %line, "Network rx");
                }
                bridge.notify_serial(line.as_bytes()).await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read from network");
                if let Err(e) = session.disconnect().await {
                    error!(error = %e, "Failed to write to serial");
                    bridge.escalate("serial write failed").await;
                }
            }
        }
    }

    debug!("Network relay stopped");
}

/// Write `TIMEOUT` to the instrument for each expiry of the response timer.
pub async fn timeout_responder(bridge: Arc<Bridge>, mut events: TimeoutEvents) {
    let ctx = bridge.context().clone();

    loop {
        tokio::select! {
            biased;
            _ = ctx.reset_started() => break,
            event = events.next() => {
                if event.is_none() {
                    break;
                }
            }
        }

        info!("Response timeout");
        bridge.notify_serial(MSG_TIMEOUT).await;
    }

    debug!("Timeout responder stopped");
}
