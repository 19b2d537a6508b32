//! Line-oriented byte channels.
//!
//! Two channels exist at runtime: one bound to the instrument's serial port
//! and one bound to the TCP peer while a session is up. Both speak the same
//! contract: reads return one newline-terminated record of bounded length,
//! writes are flushed before they return.

mod framing;
mod serial;
mod simulated;
mod tcp;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::RemoteEndpoint;
use crate::error::{Error, Result};

pub use framing::{LineReader, LineWriter};
pub use serial::{SerialLink, SerialReader, SerialWriter, open_serial};
pub use simulated::SimulatedConnector;
pub use tcp::TcpConnector;

/// One record read from a channel, terminator included when present.
#[derive(Clone, PartialEq, Eq)]
pub struct Line(Bytes);

impl Line {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw bytes of the record.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Record length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the record starts with `prefix` (byte-exact, case-sensitive).
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.0);
        f.write_str(text.trim_end_matches(['\r', '\n']))
    }
}

impl From<&'static str> for Line {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

/// Which side of the bridge a channel is bound to.
///
/// Determines how I/O failures are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Serial,
    Network,
}

impl ChannelKind {
    pub fn error(self, err: impl fmt::Display) -> Error {
        match self {
            ChannelKind::Serial => Error::serial(err),
            ChannelKind::Network => Error::network(err),
        }
    }

    pub fn closed(self) -> Error {
        match self {
            ChannelKind::Serial => Error::serial("end of stream"),
            ChannelKind::Network => Error::ConnectionClosed,
        }
    }
}

/// Read half of a line channel.
#[async_trait]
pub trait LineSource: Send {
    /// Block until one record is available.
    async fn read_line(&mut self) -> Result<Line>;
}

/// Write half of a line channel.
#[async_trait]
pub trait LineSink: Send {
    /// Write bytes and flush them to the wire.
    async fn write_line(&mut self, line: &[u8]) -> Result<()>;

    /// Shut the channel down.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Both halves of an open network channel.
pub struct NetworkChannel {
    pub source: Box<dyn LineSource>,
    pub sink: Box<dyn LineSink>,
}

impl NetworkChannel {
    pub fn new(source: impl LineSource + 'static, sink: impl LineSink + 'static) -> Self {
        Self {
            source: Box::new(source),
            sink: Box::new(sink),
        }
    }
}

impl fmt::Debug for NetworkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkChannel").finish_non_exhaustive()
    }
}

/// Opens network channels to a remote endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform one connect attempt.
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<NetworkChannel>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_prefix_is_case_sensitive() {
        let line = Line::from("MEAS:VOLT?\n");
        assert!(line.starts_with(b"MEAS"));
        assert!(!line.starts_with(b"meas"));
        assert!(!line.starts_with(b"READ"));
    }

    #[test]
    fn line_display_strips_terminator() {
        assert_eq!(Line::from("+1.23E+00\r\n").to_string(), "+1.23E+00");
        assert_eq!(Line::from("READ?\n").len(), 6);
    }

    #[test]
    fn channel_kind_classifies_errors() {
        assert!(ChannelKind::Serial.error("boom").is_fatal());
        assert!(ChannelKind::Serial.closed().is_fatal());
        assert!(ChannelKind::Network.error("boom").is_recoverable());
        assert!(matches!(ChannelKind::Network.closed(), Error::ConnectionClosed));
    }
}
