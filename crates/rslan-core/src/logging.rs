//! Tracing integration for structured logging.
//!
//! Provides logging setup for the bridge with:
//! - Configurable verbosity levels
//! - Optional file output
//! - JSON or text format
//! - A runtime gate that silences all output while the operator edits settings

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::Result;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

/// Shared switch that suppresses log emission while closed.
///
/// Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct LogGate {
    closed: Arc<AtomicBool>,
}

impl LogGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop emitting events.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Resume emitting events.
    pub fn open(&self) {
        self.closed.store(false, Ordering::Release);
    }

    /// Whether events are currently suppressed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Initialize the logging system.
///
/// # Arguments
///
/// * `verbosity` - Verbosity level (0=info, 1=debug, 2+=trace)
/// * `log_file` - Optional path to write logs to file
/// * `format` - Output format (text or JSON)
/// * `gate` - Events are dropped while the gate is closed
///
/// # Example
///
/// ```ignore
/// use rslan_core::logging::{init_logging, LogFormat, LogGate};
///
/// init_logging(0, None, LogFormat::Text, LogGate::new()).unwrap();
/// ```
pub fn init_logging(
    verbosity: u8,
    log_file: Option<&Path>,
    format: LogFormat,
    gate: LogGate,
) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Build filter with level and allow RUST_LOG override
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rslan={},rslan_core={}", level, level)));

    let gate_filter = filter_fn(move |_| !gate.is_closed());

    match (log_file, format) {
        (None, LogFormat::Text) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_timer(fmt::time::uptime())
                        .with_target(verbosity >= 1)
                        .with_file(verbosity >= 2)
                        .with_line_number(verbosity >= 2)
                        .with_filter(gate_filter),
                )
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (None, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_timer(fmt::time::uptime())
                        .with_filter(gate_filter),
                )
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (Some(path), LogFormat::Text) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_timer(fmt::time::uptime())
                        .with_target(true)
                        .with_file(verbosity >= 2)
                        .with_line_number(verbosity >= 2)
                        .with_filter(gate_filter),
                )
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
        (Some(path), LogFormat::Json) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(file)
                        .with_timer(fmt::time::uptime())
                        .with_filter(gate_filter),
                )
                .try_init()
                .map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))?;
        }
    }

    Ok(())
}

/// Initialize logging with defaults for testing.
///
/// Silently ignores errors (logging may already be initialized).
pub fn init_test_logging() {
    let _ = init_logging(1, None, LogFormat::Text, LogGate::new());
}
