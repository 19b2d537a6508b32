//! In-memory line channels.
//!
//! Each mock half comes with a handle the test keeps: push records into a
//! [`MockSource`], observe what was written to a [`MockSink`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use rslan_core::channel::{ChannelKind, Line, LineSink, LineSource};
use rslan_core::error::{Error, Result};

/// Source fed by a [`SourceHandle`].
#[derive(Debug)]
pub struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<Line>>,
    kind: ChannelKind,
}

/// Test side of a [`MockSource`].
#[derive(Debug)]
pub struct SourceHandle {
    tx: Option<mpsc::UnboundedSender<Result<Line>>>,
}

/// Create a source and the handle that feeds it.
pub fn mock_source(kind: ChannelKind) -> (MockSource, SourceHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MockSource { rx, kind }, SourceHandle { tx: Some(tx) })
}

#[async_trait]
impl LineSource for MockSource {
    async fn read_line(&mut self) -> Result<Line> {
        match self.rx.recv().await {
            Some(res) => res,
            None => Err(self.kind.closed()),
        }
    }
}

impl SourceHandle {
    /// Deliver one record. Returns false if the source is gone.
    pub fn push(&self, line: impl Into<Bytes>) -> bool {
        self.send(Ok(Line::new(line)))
    }

    /// Make the next read fail.
    pub fn push_error(&self, err: Error) -> bool {
        self.send(Err(err))
    }

    /// End of stream: reads fail once queued records are drained.
    pub fn close(&mut self) {
        self.tx = None;
    }

    fn send(&self, item: Result<Line>) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(item).is_ok())
    }
}

/// Sink observed through a [`SinkHandle`].
#[derive(Debug)]
pub struct MockSink {
    tx: mpsc::UnboundedSender<Bytes>,
    kind: ChannelKind,
    failing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

/// Test side of a [`MockSink`].
#[derive(Debug)]
pub struct SinkHandle {
    rx: mpsc::UnboundedReceiver<Bytes>,
    failing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

/// Create a sink and the handle that observes it.
pub fn mock_sink(kind: ChannelKind) -> (MockSink, SinkHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let failing = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));
    (
        MockSink {
            tx,
            kind,
            failing: failing.clone(),
            closed: closed.clone(),
        },
        SinkHandle {
            rx,
            failing,
            closed,
        },
    )
}

#[async_trait]
impl LineSink for MockSink {
    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(self.kind.error("injected write failure"));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.kind.closed());
        }
        self.tx
            .send(Bytes::copy_from_slice(line))
            .map_err(|_| self.kind.closed())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl SinkHandle {
    /// Next written record, waiting for it.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Next written record, waiting at most `wait`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<Bytes> {
        tokio::time::timeout(wait, self.rx.recv()).await.ok().flatten()
    }

    /// Next written record if one is already queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Everything written so far.
    pub fn drain(&mut self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    /// Make writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Whether the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_source_delivers_then_closes() {
        let (mut source, mut handle) = mock_source(ChannelKind::Network);
        assert!(handle.push("READ?\n"));
        handle.close();

        assert_eq!(source.read_line().await.unwrap(), Line::from("READ?\n"));
        assert!(matches!(source.read_line().await, Err(Error::ConnectionClosed)));
        assert!(!handle.push("late\n"));
    }

    #[tokio::test]
    async fn test_serial_source_close_is_fatal() {
        let (mut source, handle) = mock_source(ChannelKind::Serial);
        drop(handle);
        assert!(source.read_line().await.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_sink_records_and_fails_on_demand() {
        let (mut sink, mut handle) = mock_sink(ChannelKind::Serial);

        sink.write_line(b"CONNECTED\n").await.unwrap();
        assert_eq!(handle.try_recv().unwrap(), &b"CONNECTED\n"[..]);

        handle.set_failing(true);
        assert!(sink.write_line(b"x\n").await.unwrap_err().is_fatal());
        assert!(handle.drain().is_empty());
    }
}
