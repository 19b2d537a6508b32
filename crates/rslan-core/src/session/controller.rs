//! Ownership of the single TCP session.
//!
//! The session is either absent or one live [`Link`]. Relay workers borrow
//! the link for the duration of one read or write; a disconnect detaches it
//! and cancels its token so borrowed operations finish promptly.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ConnectPolicy, SessionConfig};
use crate::channel::{Connector, Line, LineSink, LineSource, SerialLink};
use crate::config::{ConfigStore, RemoteEndpoint, remote_or_defaults};
use crate::constants::{MSG_CONNECTED, MSG_DISCONNECTED};
use crate::context::BridgeContext;
use crate::error::{Error, Result};
use crate::indicator::StatusIndicator;

/// One established TCP session.
struct Link {
    id: u64,
    endpoint: RemoteEndpoint,
    source: AsyncMutex<Box<dyn LineSource>>,
    sink: AsyncMutex<Box<dyn LineSink>>,
    closed: CancellationToken,
}

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub active: bool,
    pub link_id: Option<u64>,
    pub endpoint: Option<RemoteEndpoint>,
}

/// Opens, uses and tears down the TCP session.
pub struct SessionController {
    ctx: Arc<BridgeContext>,
    store: Arc<dyn ConfigStore>,
    connector: Arc<dyn Connector>,
    serial: Arc<SerialLink>,
    indicator: Arc<dyn StatusIndicator>,
    config: SessionConfig,
    link: Mutex<Option<Arc<Link>>>,
    connecting: AsyncMutex<()>,
    next_id: AtomicU64,
}

impl SessionController {
    pub fn new(
        ctx: Arc<BridgeContext>,
        store: Arc<dyn ConfigStore>,
        connector: Arc<dyn Connector>,
        serial: Arc<SerialLink>,
        indicator: Arc<dyn StatusIndicator>,
        config: SessionConfig,
    ) -> Self {
        Self {
            ctx,
            store,
            connector,
            serial,
            indicator,
            config,
            link: Mutex::new(None),
            connecting: AsyncMutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    fn current(&self) -> Option<Arc<Link>> {
        self.link.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn take(&self) -> Option<Arc<Link>> {
        self.link.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Whether a usable session exists.
    pub fn is_active(&self) -> bool {
        self.current().is_some_and(|link| !link.closed.is_cancelled())
    }

    /// Current session snapshot.
    pub fn status(&self) -> SessionStatus {
        match self.current() {
            Some(link) => SessionStatus {
                active: !link.closed.is_cancelled(),
                link_id: Some(link.id),
                endpoint: Some(link.endpoint),
            },
            None => SessionStatus {
                active: false,
                link_id: None,
                endpoint: None,
            },
        }
    }

    /// Establish a session to the stored endpoint.
    ///
    /// Returns immediately if one is already up. The endpoint is re-read
    /// before every attempt. Each failed attempt sends `DISCONNECTED` to the
    /// instrument; what happens next depends on the connect policy. Returns
    /// [`Error::Shutdown`] if the bridge starts resetting meanwhile.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connecting.lock().await;

        loop {
            if self.ctx.is_resetting() {
                return Err(Error::Shutdown);
            }
            if self.is_active() {
                return Ok(());
            }

            let endpoint = remote_or_defaults(self.store.as_ref())?;
            info!(%endpoint, "Opening connection");

            let attempt = tokio::select! {
                biased;
                _ = self.ctx.reset_started() => return Err(Error::Shutdown),
                attempt = self.connector.connect(&endpoint) => attempt,
            };

            match attempt {
                Ok(channel) => {
                    let link = Arc::new(Link {
                        id: self.next_id.fetch_add(1, Ordering::Relaxed),
                        endpoint,
                        source: AsyncMutex::new(channel.source),
                        sink: AsyncMutex::new(channel.sink),
                        closed: CancellationToken::new(),
                    });
                    let id = link.id;
                    *self.link.lock().unwrap_or_else(|e| e.into_inner()) = Some(link);

                    info!(%endpoint, link_id = id, "Connected");
                    self.indicator.set_link(true);
                    self.serial.send(MSG_CONNECTED).await?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(%endpoint, error = %e, "Failed to connect");
                    self.serial.send(MSG_DISCONNECTED).await?;

                    match self.config.connect_policy {
                        ConnectPolicy::Reset => return Err(e),
                        ConnectPolicy::Retry { delay } => {
                            tokio::select! {
                                biased;
                                _ = self.ctx.reset_started() => return Err(Error::Shutdown),
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    /// Write one record to the peer.
    pub async fn send(&self, line: &[u8]) -> Result<()> {
        let link = self.current().ok_or(Error::NotConnected)?;

        let mut sink = tokio::select! {
            biased;
            _ = link.closed.cancelled() => return Err(Error::ConnectionClosed),
            sink = link.sink.lock() => sink,
        };

        tokio::select! {
            biased;
            _ = link.closed.cancelled() => Err(Error::ConnectionClosed),
            res = sink.write_line(line) => res,
        }
    }

    /// Wait for the next record from the peer.
    pub async fn recv(&self) -> Result<Line> {
        let link = self.current().ok_or(Error::NotConnected)?;

        let mut source = tokio::select! {
            biased;
            _ = link.closed.cancelled() => return Err(Error::ConnectionClosed),
            source = link.source.lock() => source,
        };

        tokio::select! {
            biased;
            _ = link.closed.cancelled() => Err(Error::ConnectionClosed),
            res = source.read_line() => res,
        }
    }

    /// Tear the session down and tell the instrument.
    ///
    /// Does nothing when no session exists. The only error is a failed
    /// serial write, which the caller must treat as fatal.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(link) = self.take() else {
            debug!("Disconnect requested without a session");
            return Ok(());
        };

        link.closed.cancel();
        self.indicator.set_link(false);
        info!(endpoint = %link.endpoint, link_id = link.id, "Disconnected");

        let notified = self.serial.send(MSG_DISCONNECTED).await;
        close_link(&link).await;
        notified
    }

    /// Drop the session without notifying anyone. Used while resetting.
    pub fn abort(&self) {
        if let Some(link) = self.take() {
            link.closed.cancel();
            self.indicator.set_link(false);
            debug!(link_id = link.id, "Session aborted");
        }
    }
}

async fn close_link(link: &Link) {
    // A writer still holding the lock lets go once it sees the cancelled
    // token; the socket is released when the last reference drops.
    if let Ok(mut sink) = link.sink.try_lock() {
        if let Err(e) = sink.close().await {
            debug!(error = %e, "Error closing network channel");
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
