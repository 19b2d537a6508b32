//! Fatal fault handling and process restart.
//!
//! Any unrecoverable condition ends in [`FaultHandler::trigger`]: the
//! resetting flag is raised so workers stop, the session is dropped, and
//! after a short grace period the process is restarted. While the operator
//! is in configuration mode faults are ignored so an edit is never cut short.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::constants::{RESET_GRACE, RESTART_REASON_ENV};
use crate::context::BridgeContext;
use crate::error::{Error, Result};
use crate::session::SessionController;

/// Why the process was (re)started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReason {
    /// Fresh start.
    Powerup,
    /// Restarted by the fault handler or the operator.
    Software,
    /// Restarted by the watchdog.
    Watchdog,
}

impl StartReason {
    /// Read the reason left by the previous incarnation of this process.
    pub fn from_env() -> Self {
        std::env::var(RESTART_REASON_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(StartReason::Powerup)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StartReason::Powerup => "Powerup",
            StartReason::Software => "Software",
            StartReason::Watchdog => "Watchdog",
        }
    }
}

impl fmt::Display for StartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "powerup" => Ok(StartReason::Powerup),
            "software" => Ok(StartReason::Software),
            "watchdog" => Ok(StartReason::Watchdog),
            _ => Err(Error::InvalidInput {
                field: "start reason",
                value: s.to_string(),
            }),
        }
    }
}

/// Restarts the whole process.
///
/// Returns only on failure.
pub trait Restarter: Send + Sync {
    fn restart(&self, reason: StartReason) -> Result<()>;
}

/// Replaces the running image with a fresh copy of itself.
///
/// Arguments are preserved; the reason travels in an environment variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecRestarter;

impl Restarter for ExecRestarter {
    fn restart(&self, reason: StartReason) -> Result<()> {
        let exe = std::env::current_exe()?;
        let mut cmd = std::process::Command::new(exe);
        cmd.args(std::env::args_os().skip(1))
            .env(RESTART_REASON_ENV, reason.as_str());

        info!(%reason, "Restarting");
        replace_process(cmd)
    }
}

#[cfg(unix)]
fn replace_process(mut cmd: std::process::Command) -> Result<()> {
    use std::os::unix::process::CommandExt;
    // exec only returns on failure
    Err(cmd.exec().into())
}

#[cfg(not(unix))]
fn replace_process(mut cmd: std::process::Command) -> Result<()> {
    cmd.spawn()?;
    std::process::exit(0)
}

/// Exits and leaves restarting to a service manager.
#[derive(Debug, Clone, Copy)]
pub struct ExitRestarter {
    code: i32,
}

impl ExitRestarter {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

impl Restarter for ExitRestarter {
    fn restart(&self, reason: StartReason) -> Result<()> {
        info!(%reason, code = self.code, "Exiting for restart");
        std::process::exit(self.code)
    }
}

/// Single entry point for fatal faults.
pub struct FaultHandler {
    ctx: Arc<BridgeContext>,
    session: Arc<SessionController>,
    restarter: Arc<dyn Restarter>,
    grace: Duration,
    restarting: AtomicBool,
}

impl FaultHandler {
    pub fn new(
        ctx: Arc<BridgeContext>,
        session: Arc<SessionController>,
        restarter: Arc<dyn Restarter>,
    ) -> Self {
        Self {
            ctx,
            session,
            restarter,
            grace: RESET_GRACE,
            restarting: AtomicBool::new(false),
        }
    }

    /// Pause between raising the resetting flag and restarting.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Reset the bridge.
    ///
    /// Returns immediately, doing nothing, in configuration mode. Otherwise
    /// never returns: the process is replaced, or if that fails the caller
    /// is parked for good.
    pub async fn trigger(&self, reason: &str) {
        if self.ctx.configuration_mode() {
            return;
        }

        error!(reason, "Resetting bridge");
        self.ctx.begin_reset();
        self.session.abort();

        if !self.restarting.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.grace).await;
            match self.restarter.restart(StartReason::Software) {
                Ok(()) => error!("Reset failed"),
                Err(e) => error!(error = %e, "Reset failed"),
            }
        } else {
            warn!(reason, "Reset already in progress");
        }

        std::future::pending::<()>().await
    }
}

impl fmt::Debug for FaultHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultHandler")
            .field("grace", &self.grace)
            .field("restarting", &self.restarting.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
