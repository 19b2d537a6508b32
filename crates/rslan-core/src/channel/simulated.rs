//! In-process stand-in for the remote peer.
//!
//! Lets the bridge run on a bench without a network. `READ?` commands are
//! answered after a short delay with canned readings; everything else is
//! swallowed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tracing::{debug, info};

use super::{ChannelKind, Connector, LineReader, LineSink, LineWriter, NetworkChannel};
use crate::config::RemoteEndpoint;
use crate::constants::SIMULATION_DELAY;
use crate::error::Result;

const QUERY: &[u8] = b"READ?";
const READINGS: [&[u8]; 2] = [b"+7.28384854E-12\n", b"-2.34567892E+03\n"];
const PIPE_CAPACITY: usize = 1024;

/// Connector whose sessions are served by a simulated instrument peer.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    delay: Duration,
    next_reading: Arc<AtomicUsize>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self {
            delay: SIMULATION_DELAY,
            next_reading: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<NetworkChannel> {
        info!(%endpoint, "Simulated session opened");

        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        let (rx, tx) = tokio::io::split(local);
        let (peer_rx, peer_tx) = tokio::io::split(remote);

        tokio::spawn(serve(
            LineReader::new(peer_rx, ChannelKind::Network),
            LineWriter::new(peer_tx, ChannelKind::Network),
            self.delay,
            self.next_reading.clone(),
        ));

        Ok(NetworkChannel::new(
            LineReader::new(rx, ChannelKind::Network),
            LineWriter::new(tx, ChannelKind::Network),
        ))
    }
}

async fn serve(
    mut rx: LineReader<ReadHalf<DuplexStream>>,
    mut tx: LineWriter<WriteHalf<DuplexStream>>,
    delay: Duration,
    next_reading: Arc<AtomicUsize>,
) {
    while let Ok(line) = rx.next_line().await {
        if !line.starts_with(QUERY) {
            debug!(%line, "Simulated peer ignored command");
            continue;
        }

        tokio::time::sleep(delay).await;
        let idx = next_reading.fetch_add(1, Ordering::Relaxed) % READINGS.len();
        if tx.write_line(READINGS[idx]).await.is_err() {
            break;
        }
    }
    debug!("Simulated session closed");
}
