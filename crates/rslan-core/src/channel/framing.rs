//! Bounded newline framing over async byte streams.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{ChannelKind, Line, LineSink, LineSource};
use crate::constants::{LINE_TERMINATOR, MAX_LINE_LEN};
use crate::error::Result;

/// Splits a byte stream into newline-terminated records.
///
/// Records are capped at `max_len - 1` bytes. A longer line is delivered in
/// consecutive capped pieces; only the last piece carries the terminator.
/// At end of stream a pending partial record is returned once, after which
/// reads fail.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    kind: ChannelKind,
    max_len: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// Wrap a reader with the default buffer size.
    pub fn new(inner: R, kind: ChannelKind) -> Self {
        Self::with_max_len(inner, kind, MAX_LINE_LEN)
    }

    /// Wrap a reader with a custom line buffer size (at least 2).
    pub fn with_max_len(inner: R, kind: ChannelKind, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            kind,
            max_len: max_len.max(2),
        }
    }

    /// Read the next record.
    pub async fn next_line(&mut self) -> Result<Line> {
        let kind = self.kind;
        let limit = self.max_len - 1;
        let mut line = BytesMut::with_capacity(64);

        loop {
            let (consumed, complete) = {
                let available = match self.inner.fill_buf().await {
                    Ok(buf) => buf,
                    Err(e) => return Err(kind.error(e)),
                };

                if available.is_empty() {
                    if line.is_empty() {
                        return Err(kind.closed());
                    }
                    return Ok(Line::new(line.freeze()));
                }

                let room = limit - line.len();
                let window = &available[..available.len().min(room)];

                match window.iter().position(|&b| b == LINE_TERMINATOR) {
                    Some(idx) => {
                        line.extend_from_slice(&window[..=idx]);
                        (idx + 1, true)
                    }
                    None => {
                        line.extend_from_slice(window);
                        (window.len(), line.len() == limit)
                    }
                }
            };

            self.inner.consume(consumed);
            if complete {
                return Ok(Line::new(line.freeze()));
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn read_line(&mut self) -> Result<Line> {
        self.next_line().await
    }
}

/// Writes records and flushes after each one.
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
    kind: ChannelKind,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W, kind: ChannelKind) -> Self {
        Self { inner, kind }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for LineWriter<W> {
    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.inner
            .write_all(line)
            .await
            .map_err(|e| self.kind.error(e))?;
        self.inner.flush().await.map_err(|e| self.kind.error(e))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(|e| self.kind.error(e))
    }
}
