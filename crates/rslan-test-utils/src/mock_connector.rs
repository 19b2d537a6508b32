//! Scriptable connector.
//!
//! Every accepted connect hands the test a [`PeerSession`]: the peer side of
//! the new network channel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use rslan_core::channel::{ChannelKind, Connector, NetworkChannel};
use rslan_core::config::RemoteEndpoint;
use rslan_core::error::{Error, Result};

use crate::mock_channel::{SinkHandle, SourceHandle, mock_sink, mock_source};

/// Peer side of one accepted session.
#[derive(Debug)]
pub struct PeerSession {
    /// Endpoint the bridge dialed.
    pub endpoint: RemoteEndpoint,
    /// Push replies towards the bridge. Closing it hangs up.
    pub to_bridge: SourceHandle,
    /// Records the bridge sent to the peer.
    pub from_bridge: SinkHandle,
}

/// Stream of accepted sessions.
#[derive(Debug)]
pub struct PeerSessions {
    rx: mpsc::UnboundedReceiver<PeerSession>,
}

impl PeerSessions {
    pub async fn next(&mut self) -> Option<PeerSession> {
        self.rx.recv().await
    }

    pub async fn next_timeout(&mut self, wait: Duration) -> Option<PeerSession> {
        tokio::time::timeout(wait, self.rx.recv()).await.ok().flatten()
    }
}

#[derive(Debug, Default)]
struct Script {
    attempts: Vec<RemoteEndpoint>,
    refuse_next: VecDeque<String>,
    refuse_all: bool,
}

/// Connector whose outcomes are decided by the test.
///
/// Accepts by default.
#[derive(Debug)]
pub struct MockConnector {
    script: Mutex<Script>,
    sessions: mpsc::UnboundedSender<PeerSession>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, PeerSessions) {
        let (sessions, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                script: Mutex::new(Script::default()),
                sessions,
            }),
            PeerSessions { rx },
        )
    }

    /// Refuse the next attempt with the given message.
    pub fn refuse_next(&self, message: impl Into<String>) {
        self.lock().refuse_next.push_back(message.into());
    }

    /// Refuse every attempt until turned off.
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Endpoints of every attempt so far.
    pub fn attempts(&self) -> Vec<RemoteEndpoint> {
        self.lock().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<NetworkChannel> {
        let refusal = {
            let mut script = self.lock();
            script.attempts.push(*endpoint);
            match script.refuse_next.pop_front() {
                Some(message) => Some(message),
                None if script.refuse_all => Some("connection refused".to_string()),
                None => None,
            }
        };

        if let Some(message) = refusal {
            return Err(Error::Connect {
                endpoint: endpoint.to_string(),
                message,
            });
        }

        let (source, to_bridge) = mock_source(ChannelKind::Network);
        let (sink, from_bridge) = mock_sink(ChannelKind::Network);
        let _ = self.sessions.send(PeerSession {
            endpoint: *endpoint,
            to_bridge,
            from_bridge,
        });

        Ok(NetworkChannel::new(source, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_refusals_then_accept() {
        let (connector, mut sessions) = MockConnector::new();
        connector.refuse_next("first");
        let endpoint = RemoteEndpoint::default();

        match connector.connect(&endpoint).await {
            Err(Error::Connect { message, .. }) => assert_eq!(message, "first"),
            other => panic!("unexpected: {other:?}"),
        }
        connector.connect(&endpoint).await.unwrap();

        assert_eq!(connector.attempt_count(), 2);
        assert_eq!(sessions.next().await.unwrap().endpoint, endpoint);
    }
}
