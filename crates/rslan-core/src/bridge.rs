//! Bridge assembly.
//!
//! [`Bridge`] owns every shared piece of state and spawns the three workers:
//! serial-to-network relay, network-to-serial relay, and timeout responder.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::channel::{Connector, LineSink, LineSource, SerialLink};
use crate::config::ConfigStore;
use crate::constants::{DEFAULT_RESPONSE_PREFIXES, RESET_GRACE, RESPONSE_TIMEOUT};
use crate::context::BridgeContext;
use crate::error::{Error, Result};
use crate::fault::{FaultHandler, Restarter};
use crate::indicator::StatusIndicator;
use crate::relay;
use crate::session::{SessionConfig, SessionController, SessionStatus};
use crate::timeout::{ResponseTimeout, TimeoutEvents};

/// Pause after a fault was ignored in configuration mode, so a persistent
/// failure does not spin.
const SUPPRESSED_FAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Bridge tuning.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Command prefixes that arm the response timer.
    pub response_prefixes: Vec<Bytes>,
    /// How long to wait for a reply.
    pub response_timeout: Duration,
    /// Pause before a reset restarts the process.
    pub reset_grace: Duration,
    /// Session behavior.
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_prefixes: DEFAULT_RESPONSE_PREFIXES
                .iter()
                .map(|p| Bytes::from_static(p.as_bytes()))
                .collect(),
            response_timeout: RESPONSE_TIMEOUT,
            reset_grace: RESET_GRACE,
            session: SessionConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the reply-expected prefixes.
    pub fn with_response_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_prefixes = prefixes
            .into_iter()
            .map(|p| Bytes::from(Into::<String>::into(p)))
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_reset_grace(mut self, grace: Duration) -> Self {
        self.reset_grace = grace;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Whether a record is a command that expects a reply.
    pub fn expects_reply(&self, line: &[u8]) -> bool {
        self.response_prefixes.iter().any(|p| line.starts_with(p))
    }
}

/// External collaborators of a bridge.
pub struct BridgeParts {
    pub store: Arc<dyn ConfigStore>,
    pub connector: Arc<dyn Connector>,
    pub serial_sink: Box<dyn LineSink>,
    pub restarter: Arc<dyn Restarter>,
    pub indicator: Arc<dyn StatusIndicator>,
}

/// Point-in-time view of the bridge for the status dump.
#[derive(Debug, Clone)]
pub struct BridgeStatus {
    pub session: SessionStatus,
    pub timeout_armed: bool,
    pub log_msgs: bool,
    pub configuration_mode: bool,
    pub resetting: bool,
    pub uptime: Duration,
}

/// Handles to the spawned workers.
#[derive(Debug)]
pub struct BridgeTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BridgeTasks {
    /// Wait for every worker to finish.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "Bridge worker panicked");
                }
            }
        }
    }

    /// Stop every worker.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// The serial/TCP bridge.
pub struct Bridge {
    ctx: Arc<BridgeContext>,
    config: BridgeConfig,
    store: Arc<dyn ConfigStore>,
    serial: Arc<SerialLink>,
    session: Arc<SessionController>,
    timeout: Arc<ResponseTimeout>,
    fault: Arc<FaultHandler>,
    indicator: Arc<dyn StatusIndicator>,
    events: Mutex<Option<TimeoutEvents>>,
}

impl Bridge {
    pub fn new(ctx: Arc<BridgeContext>, config: BridgeConfig, parts: BridgeParts) -> Arc<Self> {
        let serial = Arc::new(SerialLink::from_boxed(parts.serial_sink));
        let session = Arc::new(SessionController::new(
            ctx.clone(),
            parts.store.clone(),
            parts.connector,
            serial.clone(),
            parts.indicator.clone(),
            config.session.clone(),
        ));
        let fault = Arc::new(
            FaultHandler::new(ctx.clone(), session.clone(), parts.restarter)
                .with_grace(config.reset_grace),
        );
        let (timeout, events) = ResponseTimeout::new(config.response_timeout);

        Arc::new(Self {
            ctx,
            config,
            store: parts.store,
            serial,
            session,
            timeout,
            fault,
            indicator: parts.indicator,
            events: Mutex::new(Some(events)),
        })
    }

    /// Spawn the workers. May be called once.
    pub fn start(self: &Arc<Self>, serial_source: Box<dyn LineSource>) -> Result<BridgeTasks> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| Error::config("bridge already started"))?;

        info!(
            timeout_ms = self.config.response_timeout.as_millis() as u64,
            policy = ?self.config.session.connect_policy,
            "Starting bridge"
        );

        let handles = vec![
            tokio::spawn(relay::serial_to_network(self.clone(), serial_source)),
            tokio::spawn(relay::network_to_serial(self.clone())),
            tokio::spawn(relay::timeout_responder(self.clone(), events)),
        ];
        Ok(BridgeTasks { handles })
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn timeout(&self) -> &Arc<ResponseTimeout> {
        &self.timeout
    }

    pub fn fault(&self) -> &Arc<FaultHandler> {
        &self.fault
    }

    pub fn indicator(&self) -> &Arc<dyn StatusIndicator> {
        &self.indicator
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            session: self.session.status(),
            timeout_armed: self.timeout.is_armed(),
            log_msgs: self.ctx.log_msgs(),
            configuration_mode: self.ctx.configuration_mode(),
            resetting: self.ctx.is_resetting(),
            uptime: self.ctx.uptime(),
        }
    }

    /// Write to the instrument; a failure is escalated. Returns whether the
    /// write succeeded.
    pub(crate) async fn notify_serial(&self, line: &[u8]) -> bool {
        match self.serial.send(line).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to write to serial");
                self.escalate("serial write failed").await;
                false
            }
        }
    }

    /// Hand a fatal condition to the fault handler. Only returns if the fault
    /// was ignored.
    pub(crate) async fn escalate(&self, reason: &str) {
        self.fault.trigger(reason).await;
        tokio::time::sleep(SUPPRESSED_FAULT_BACKOFF).await;
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
