//! TCP connector.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::{ChannelKind, Connector, LineReader, LineWriter, NetworkChannel};
use crate::config::RemoteEndpoint;
use crate::constants::CONNECT_TIMEOUT;
use crate::error::{Error, Result};

/// Opens plain TCP sessions.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Bound each connect attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<NetworkChannel> {
        let connect_error = |message: String| Error::Connect {
            endpoint: endpoint.to_string(),
            message,
        };

        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(endpoint.socket_addr()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_error(e.to_string())),
            Err(_) => return Err(connect_error("timed out".to_string())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let (rx, tx) = stream.into_split();
        Ok(NetworkChannel::new(
            LineReader::new(rx, ChannelKind::Network),
            LineWriter::new(tx, ChannelKind::Network),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;
    use crate::channel::Line;

    #[tokio::test]
    async fn connects_and_exchanges_lines() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rx, mut tx) = stream.into_split();
            let mut rx = BufReader::new(rx);
            let mut cmd = String::new();
            rx.read_line(&mut cmd).await.unwrap();
            tx.write_all(b"+1.00000000E+00\n").await.unwrap();
            cmd
        });

        let endpoint = RemoteEndpoint::new(Ipv4Addr::LOCALHOST, port);
        let mut channel = TcpConnector::new().connect(&endpoint).await.unwrap();

        channel.sink.write_line(b"READ?\n").await.unwrap();
        assert_eq!(
            channel.source.read_line().await.unwrap(),
            Line::from("+1.00000000E+00\n")
        );
        assert_eq!(server.await.unwrap(), "READ?\n");
    }

    #[tokio::test]
    async fn refused_connection_reports_endpoint() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let endpoint = RemoteEndpoint::new(Ipv4Addr::LOCALHOST, port);
        let err = TcpConnector::new()
            .with_connect_timeout(Duration::from_secs(2))
            .connect(&endpoint)
            .await
            .unwrap_err();
        match err {
            Error::Connect { endpoint: ep, .. } => assert_eq!(ep, format!("127.0.0.1:{port}")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn peer_close_surfaces_as_connection_closed() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let endpoint = RemoteEndpoint::new(Ipv4Addr::LOCALHOST, port);
        let mut channel = TcpConnector::new().connect(&endpoint).await.unwrap();
        server.await.unwrap();

        assert!(matches!(
            channel.source.read_line().await,
            Err(Error::ConnectionClosed)
        ));
    }
}
