//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use rslan_core::constants::{
    DEFAULT_BAUD, DEFAULT_CONFIG_PATH, DEFAULT_RESPONSE_PREFIXES, DEFAULT_SERIAL_DEVICE,
    RECONNECT_DELAY, RESET_GRACE, RESPONSE_TIMEOUT, WATCHDOG_FEED_INTERVAL, WATCHDOG_TIMEOUT,
};
use rslan_core::fault::{ExecRestarter, ExitRestarter, Restarter};
use rslan_core::session::{ConnectPolicy, SessionConfig};
use rslan_core::BridgeConfig;

/// Exit status used by `--restart exit` (EX_TEMPFAIL).
pub const RESTART_EXIT_CODE: i32 = 75;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for rslan_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => rslan_core::LogFormat::Text,
            CliLogFormat::Json => rslan_core::LogFormat::Json,
        }
    }
}

/// What to do when a connect attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConnectPolicyArg {
    /// Restart the bridge.
    #[default]
    Reset,
    /// Wait and try again.
    Retry,
}

/// How the bridge restarts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RestartMode {
    /// Re-execute the binary in place.
    #[default]
    Exec,
    /// Exit and let a service manager restart it.
    Exit,
}

/// rslan - serial-to-TCP bridge for line-oriented instruments.
#[derive(Debug, Parser)]
#[command(
    name = "rslan",
    version,
    about = "rslan - serial-to-TCP bridge for line-oriented instruments"
)]
pub struct Cli {
    /// Serial device the instrument is attached to
    #[arg(
        short = 'd',
        long = "device",
        default_value = DEFAULT_SERIAL_DEVICE,
        env = "RSLAN_DEVICE",
        value_name = "PATH"
    )]
    pub device: String,

    /// Serial speed
    #[arg(short = 'b', long = "baud", default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    /// Persisted parameter file
    #[arg(
        short = 'c',
        long = "config",
        default_value = DEFAULT_CONFIG_PATH,
        env = "RSLAN_CONFIG",
        value_name = "FILE"
    )]
    pub config: PathBuf,

    /// Reply timeout for reply-expected commands (milliseconds)
    #[arg(
        long = "response-timeout-ms",
        default_value_t = RESPONSE_TIMEOUT.as_millis() as u64,
        value_name = "MS"
    )]
    pub response_timeout_ms: u64,

    /// Command prefix that expects a reply (repeatable)
    #[arg(
        long = "prefix",
        action = ArgAction::Append,
        default_values_t = DEFAULT_RESPONSE_PREFIXES.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        value_name = "PREFIX"
    )]
    pub prefixes: Vec<String>,

    /// What to do when connecting fails
    #[arg(long = "connect-policy", default_value = "reset")]
    pub connect_policy: ConnectPolicyArg,

    /// Delay between connect attempts with --connect-policy retry (milliseconds)
    #[arg(
        long = "reconnect-delay-ms",
        default_value_t = RECONNECT_DELAY.as_millis() as u64,
        value_name = "MS"
    )]
    pub reconnect_delay_ms: u64,

    /// Pause before restarting after a fault (milliseconds)
    #[arg(
        long = "reset-grace-ms",
        default_value_t = RESET_GRACE.as_millis() as u64,
        value_name = "MS"
    )]
    pub reset_grace_ms: u64,

    /// How to restart after a fault
    #[arg(long = "restart", default_value = "exec")]
    pub restart: RestartMode,

    /// Watchdog expiry (milliseconds)
    #[arg(
        long = "watchdog-timeout-ms",
        default_value_t = WATCHDOG_TIMEOUT.as_millis() as u64,
        value_name = "MS"
    )]
    pub watchdog_timeout_ms: u64,

    /// Watchdog feed interval (milliseconds)
    #[arg(
        long = "watchdog-feed-ms",
        default_value_t = WATCHDOG_FEED_INTERVAL.as_millis() as u64,
        value_name = "MS"
    )]
    pub watchdog_feed_ms: u64,

    /// Do not read operator commands from stdin
    #[arg(long = "no-console")]
    pub no_console: bool,

    /// Answer commands from a simulated peer instead of TCP
    #[arg(long = "simulate")]
    pub simulate: bool,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stdout
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    /// Reject combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.response_timeout_ms == 0 {
            return Err("--response-timeout-ms must be greater than 0".to_string());
        }
        if self.watchdog_feed_ms == 0 {
            return Err("--watchdog-feed-ms must be greater than 0".to_string());
        }
        if self.watchdog_feed_ms >= self.watchdog_timeout_ms {
            return Err(format!(
                "--watchdog-feed-ms ({}) must be shorter than --watchdog-timeout-ms ({})",
                self.watchdog_feed_ms, self.watchdog_timeout_ms
            ));
        }
        if self.prefixes.iter().any(|p| p.is_empty()) {
            return Err("--prefix cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn reset_grace(&self) -> Duration {
        Duration::from_millis(self.reset_grace_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn watchdog_feed_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_feed_ms)
    }

    pub fn connect_policy(&self) -> ConnectPolicy {
        match self.connect_policy {
            ConnectPolicyArg::Reset => ConnectPolicy::Reset,
            ConnectPolicyArg::Retry => ConnectPolicy::Retry {
                delay: Duration::from_millis(self.reconnect_delay_ms),
            },
        }
    }

    /// Bridge tuning derived from the flags.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_response_prefixes(self.prefixes.iter().cloned())
            .with_response_timeout(self.response_timeout())
            .with_reset_grace(self.reset_grace())
            .with_session(SessionConfig::new().with_connect_policy(self.connect_policy()))
    }

    pub fn restarter(&self) -> Arc<dyn Restarter> {
        match self.restart {
            RestartMode::Exec => Arc::new(ExecRestarter),
            RestartMode::Exit => Arc::new(ExitRestarter::new(RESTART_EXIT_CODE)),
        }
    }

    pub fn console_enabled(&self) -> bool {
        !self.no_console
    }
}

// =============================================================================
// Tests
// =============================================================================
