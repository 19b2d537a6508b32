//! Error types for rslan-core.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial link failed. The bridge cannot do its job without it.
    #[error("serial error: {message}")]
    Serial { message: String },

    /// The network channel failed.
    #[error("network error: {message}")]
    Network { message: String },

    /// Opening a TCP session to the remote endpoint failed.
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// No TCP session is currently established.
    #[error("not connected")]
    NotConnected,

    /// The channel was closed by the peer or by a local disconnect.
    #[error("connection closed")]
    ConnectionClosed,

    /// Persisted configuration could not be read or written.
    #[error("config error: {message}")]
    Config { message: String },

    /// Operator input did not parse.
    #[error("invalid {field}: {value:?}")]
    InvalidInput { field: &'static str, value: String },

    /// The bridge is resetting; the operation was abandoned.
    #[error("bridge is shutting down")]
    Shutdown,
}

impl Error {
    /// Returns true if this error means the serial link is unusable.
    ///
    /// Fatal errors route to the fault handler and restart the bridge.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Serial { .. })
    }

    /// Returns true if dropping the session and reconnecting may help.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Network { .. }
                | Error::Connect { .. }
                | Error::ConnectionClosed
                | Error::NotConnected
        )
    }

    /// Build a serial error from anything displayable.
    pub fn serial(message: impl std::fmt::Display) -> Self {
        Error::Serial {
            message: message.to_string(),
        }
    }

    /// Build a network error from anything displayable.
    pub fn network(message: impl std::fmt::Display) -> Self {
        Error::Network {
            message: message.to_string(),
        }
    }

    /// Build a config error from anything displayable.
    pub fn config(message: impl std::fmt::Display) -> Self {
        Error::Config {
            message: message.to_string(),
        }
    }
}

/// Convenience result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
