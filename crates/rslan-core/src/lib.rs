//! rslan-core: serial-to-TCP bridge for line-oriented instruments.
//!
//! This crate provides:
//! - Line framing over serial and TCP channels
//! - Session management with connect/disconnect notifications
//! - Response timeout supervision
//! - Fault handling, restart and a software watchdog
//! - Persisted endpoint and network parameters
//! - Logging

pub mod bridge;
pub mod channel;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod fault;
pub mod indicator;
pub mod logging;
pub mod relay;
pub mod session;
pub mod timeout;
pub mod watchdog;

pub use bridge::{Bridge, BridgeConfig, BridgeParts, BridgeStatus, BridgeTasks};
pub use context::BridgeContext;
pub use error::{Error, Result};
pub use logging::{LogFormat, LogGate, init_logging};
