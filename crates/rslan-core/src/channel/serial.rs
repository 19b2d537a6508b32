//! Instrument UART.

use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use super::{ChannelKind, LineReader, LineSink, LineWriter};
use crate::error::{Error, Result};

/// Read half of an opened serial port.
pub type SerialReader = LineReader<ReadHalf<SerialStream>>;

/// Write half of an opened serial port.
pub type SerialWriter = LineWriter<WriteHalf<SerialStream>>;

/// Open the instrument port at 8N1 without flow control.
pub fn open_serial(device: &str, baud: u32) -> Result<(SerialReader, SerialWriter)> {
    let port = tokio_serial::new(device, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| Error::serial(format!("failed to open {device}: {e}")))?;

    info!(device, baud, "Opened serial port");

    let (rx, tx) = tokio::io::split(port);
    Ok((
        LineReader::new(rx, ChannelKind::Serial),
        LineWriter::new(tx, ChannelKind::Serial),
    ))
}

/// Shared serial output.
///
/// Relayed replies and notifications come from several workers; each write
/// holds the lock for the whole record so records never interleave.
pub struct SerialLink {
    writer: Mutex<Box<dyn LineSink>>,
}

impl SerialLink {
    pub fn new(sink: impl LineSink + 'static) -> Self {
        Self::from_boxed(Box::new(sink))
    }

    pub fn from_boxed(sink: Box<dyn LineSink>) -> Self {
        Self {
            writer: Mutex::new(sink),
        }
    }

    /// Write one record to the instrument.
    pub async fn send(&self, line: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        debug!(len = line.len(), "Writing to serial");
        writer.write_line(line).await
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Line;
    use crate::constants::MSG_DISCONNECTED;

    #[test]
    fn open_missing_device_is_fatal() {
        let err = open_serial("/dev/rslan-does-not-exist", 38400).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn concurrent_sends_do_not_interleave() {
        let (tx, rx) = tokio::io::duplex(16);
        let link = std::sync::Arc::new(SerialLink::new(LineWriter::new(tx, ChannelKind::Serial)));
        let mut reader = LineReader::new(rx, ChannelKind::Serial);

        let a = {
            let link = link.clone();
            tokio::spawn(async move { link.send(b"+7.28384854E-12\n").await })
        };
        let b = {
            let link = link.clone();
            tokio::spawn(async move { link.send(MSG_DISCONNECTED).await })
        };

        let mut got = vec![
            reader.next_line().await.unwrap(),
            reader.next_line().await.unwrap(),
        ];
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        got.sort_by(|x, y| x.as_bytes().cmp(y.as_bytes()));
        assert_eq!(got, vec![Line::from("+7.28384854E-12\n"), Line::from("DISCONNECTED\n")]);
    }
}
