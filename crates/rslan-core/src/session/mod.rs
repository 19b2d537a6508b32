//! TCP session management.

mod config;
mod controller;

pub use config::{ConnectPolicy, SessionConfig};
pub use controller::{SessionController, SessionStatus};
