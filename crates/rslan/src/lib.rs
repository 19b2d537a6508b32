//! rslan: serial-to-TCP bridge binary.
//!
//! Provides:
//! - Command-line parsing
//! - Operator console
//! - Process wiring around the rslan-core bridge

pub mod app;
pub mod cli;
pub mod console;

pub use cli::Cli;
