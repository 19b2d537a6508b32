//! End-to-end bridge behavior with mock serial and network peers.
//!
//! Runs on a paused clock so timer properties are exact.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use rslan_core::channel::ChannelKind;
use rslan_core::config::RemoteEndpoint;
use rslan_core::constants::{MSG_CONNECTED, MSG_DISCONNECTED, MSG_TIMEOUT};
use rslan_core::fault::StartReason;
use rslan_core::indicator::LogIndicator;
use rslan_core::session::{ConnectPolicy, SessionConfig};
use rslan_core::{Bridge, BridgeConfig, BridgeContext, BridgeParts, BridgeTasks, Error};
use rslan_test_utils::{
    MemoryConfigStore, MockConnector, PeerSession, PeerSessions, RecordingRestarter, SinkHandle,
    SourceHandle, mock_sink, mock_source,
};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_secs(1);

struct Harness {
    ctx: Arc<BridgeContext>,
    bridge: Arc<Bridge>,
    tasks: BridgeTasks,
    serial_in: SourceHandle,
    serial_out: SinkHandle,
    connector: Arc<MockConnector>,
    sessions: PeerSessions,
    store: Arc<MemoryConfigStore>,
    restarter: Arc<RecordingRestarter>,
    indicator: Arc<LogIndicator>,
}

impl Harness {
    fn start(config: BridgeConfig) -> Self {
        Self::start_with(config, |_, _| {})
    }

    fn start_with(
        config: BridgeConfig,
        before: impl FnOnce(&BridgeContext, &MockConnector),
    ) -> Self {
        rslan_core::logging::init_test_logging();
        let ctx = Arc::new(BridgeContext::new());
        let store = Arc::new(MemoryConfigStore::new());
        let (connector, sessions) = MockConnector::new();
        let (serial_source, serial_in) = mock_source(ChannelKind::Serial);
        let (serial_sink, serial_out) = mock_sink(ChannelKind::Serial);
        let restarter = Arc::new(RecordingRestarter::new());
        let indicator = Arc::new(LogIndicator::new());

        before(&ctx, &connector);

        let bridge = Bridge::new(
            ctx.clone(),
            config,
            BridgeParts {
                store: store.clone(),
                connector: connector.clone(),
                serial_sink: Box::new(serial_sink),
                restarter: restarter.clone(),
                indicator: indicator.clone(),
            },
        );
        let tasks = bridge.start(Box::new(serial_source)).unwrap();

        Self {
            ctx,
            bridge,
            tasks,
            serial_in,
            serial_out,
            connector,
            sessions,
            store,
            restarter,
            indicator,
        }
    }

    /// Start with the default configuration and wait for the first session.
    async fn connected() -> (Self, PeerSession) {
        let mut h = Self::start(BridgeConfig::default());
        let peer = h.next_session().await;
        h.expect_serial(MSG_CONNECTED).await;
        (h, peer)
    }

    async fn next_session(&mut self) -> PeerSession {
        self.sessions.next_timeout(WAIT).await.expect("no session opened")
    }

    async fn expect_serial(&mut self, expected: &[u8]) {
        let got = self.serial_out.recv_timeout(WAIT).await;
        assert_eq!(got.as_deref(), Some(expected));
    }

    async fn expect_serial_quiet(&mut self) {
        let got = self.serial_out.recv_timeout(QUIET).await;
        assert!(got.is_none(), "unexpected serial output: {got:?}");
    }
}

async fn expect_network(peer: &mut PeerSession, expected: &[u8]) {
    let got = peer.from_bridge.recv_timeout(WAIT).await;
    assert_eq!(got.as_deref(), Some(expected));
}

fn retry_forever(delay: Duration) -> BridgeConfig {
    BridgeConfig::new().with_session(
        SessionConfig::new().with_connect_policy(ConnectPolicy::Retry { delay }),
    )
}

// =============================================================================
// Relaying
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connects_on_start() {
    let (h, peer) = Harness::connected().await;
    assert_eq!(peer.endpoint, RemoteEndpoint::default());
    assert!(h.bridge.session().is_active());
    assert!(h.indicator.link_on());
}

#[tokio::test(start_paused = true)]
async fn test_reply_is_relayed_without_timeout() {
    let (mut h, mut peer) = Harness::connected().await;

    h.serial_in.push("MEAS:VOLT?\n");
    expect_network(&mut peer, b"MEAS:VOLT?\n").await;
    assert!(h.bridge.timeout().is_armed());

    peer.to_bridge.push("+1.23E+00\n");
    h.expect_serial(b"+1.23E+00\n").await;
    assert!(!h.bridge.timeout().is_armed());
    assert!(h.indicator.activity_on());

    h.expect_serial_quiet().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_reply_times_out_once() {
    let (mut h, mut peer) = Harness::connected().await;

    let sent = Instant::now();
    h.serial_in.push("MEAS:VOLT?\n");
    expect_network(&mut peer, b"MEAS:VOLT?\n").await;

    h.expect_serial(MSG_TIMEOUT).await;
    assert!(sent.elapsed() >= Duration::from_millis(100));
    assert!(!h.bridge.timeout().is_armed());

    h.expect_serial_quiet().await;
}

#[tokio::test(start_paused = true)]
async fn test_unprefixed_lines_never_arm() {
    let (mut h, mut peer) = Harness::connected().await;

    for line in ["*RST\n", "read?\n", "CONF:VOLT 10\n"] {
        h.serial_in.push(line);
        expect_network(&mut peer, line.as_bytes()).await;
        assert!(!h.bridge.timeout().is_armed());
    }

    h.expect_serial_quiet().await;
}

#[tokio::test(start_paused = true)]
async fn test_rearm_does_not_stack() {
    let (mut h, mut peer) = Harness::connected().await;

    h.serial_in.push("READ?\n");
    h.serial_in.push("READ?\n");
    expect_network(&mut peer, b"READ?\n").await;
    expect_network(&mut peer, b"READ?\n").await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    peer.to_bridge.push("+7.28384854E-12\n");
    h.expect_serial(b"+7.28384854E-12\n").await;
    h.expect_serial_quiet().await;
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_commands_without_reply_time_out_once() {
    let (mut h, mut peer) = Harness::connected().await;

    h.serial_in.push("READ?\n");
    h.serial_in.push("MEAS?\n");
    expect_network(&mut peer, b"READ?\n").await;
    expect_network(&mut peer, b"MEAS?\n").await;

    h.expect_serial(MSG_TIMEOUT).await;
    h.expect_serial_quiet().await;
}

#[tokio::test(start_paused = true)]
async fn test_custom_prefixes() {
    let mut h = Harness::start(BridgeConfig::new().with_response_prefixes(["FETC"]));
    let mut peer = h.next_session().await;
    h.expect_serial(MSG_CONNECTED).await;

    h.serial_in.push("READ?\n");
    expect_network(&mut peer, b"READ?\n").await;
    assert!(!h.bridge.timeout().is_armed());

    h.serial_in.push("FETC?\n");
    expect_network(&mut peer, b"FETC?\n").await;
    h.expect_serial(MSG_TIMEOUT).await;
}

#[tokio::test(start_paused = true)]
async fn test_network_write_failure_is_soft() {
    let (mut h, mut peer) = Harness::connected().await;
    peer.from_bridge.set_failing(true);

    h.serial_in.push("READ?\n");
    h.expect_serial_quiet().await;
    assert!(!h.bridge.timeout().is_armed());
    assert!(h.bridge.session().is_active());
    assert_eq!(h.restarter.count(), 0);

    peer.from_bridge.set_failing(false);
    h.serial_in.push("*IDN?\n");
    expect_network(&mut peer, b"*IDN?\n").await;
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_serial_line_while_disconnected() {
    let mut h = Harness::start(retry_forever(Duration::from_secs(60)));
    let mut peer = h.next_session().await;
    h.expect_serial(MSG_CONNECTED).await;

    h.connector.refuse_all(true);
    peer.to_bridge.close();

    // Teardown, then the failed reconnect attempt
    h.expect_serial(MSG_DISCONNECTED).await;
    h.expect_serial(MSG_DISCONNECTED).await;
    assert!(!h.bridge.session().is_active());
    assert!(!h.indicator.link_on());

    h.serial_in.push("MEAS:VOLT?\n");
    h.expect_serial(MSG_DISCONNECTED).await;
    assert!(!h.bridge.timeout().is_armed());
    assert!(peer.from_bridge.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_uses_updated_endpoint() {
    let (mut h, mut peer) = Harness::connected().await;
    let edited = RemoteEndpoint::new(Ipv4Addr::new(10, 32, 96, 99), 6000);
    h.store.set_remote(edited);

    peer.to_bridge.close();
    h.expect_serial(MSG_DISCONNECTED).await;

    let next = h.next_session().await;
    h.expect_serial(MSG_CONNECTED).await;
    assert_eq!(next.endpoint, edited);
    assert_eq!(h.connector.attempts(), vec![RemoteEndpoint::default(), edited]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_keeps_trying() {
    let mut h = Harness::start_with(retry_forever(Duration::from_millis(100)), |_, connector| {
        connector.refuse_next("refused");
        connector.refuse_next("refused");
    });

    h.expect_serial(MSG_DISCONNECTED).await;
    h.expect_serial(MSG_DISCONNECTED).await;
    let _peer = h.next_session().await;
    h.expect_serial(MSG_CONNECTED).await;

    assert_eq!(h.connector.attempt_count(), 3);
    assert_eq!(h.restarter.count(), 0);
}

// =============================================================================
// Faults
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_failure_resets_by_default() {
    let mut h = Harness::start_with(BridgeConfig::default(), |_, connector| {
        connector.refuse_all(true);
    });

    h.expect_serial(MSG_DISCONNECTED).await;
    tokio::time::timeout(WAIT, h.restarter.wait()).await.unwrap();

    assert!(h.ctx.is_resetting());
    assert_eq!(h.restarter.reasons(), vec![StartReason::Software]);
    assert_eq!(h.connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_serial_read_failure_resets() {
    let (h, _peer) = Harness::connected().await;

    let started = Instant::now();
    h.serial_in.push_error(Error::serial("device unplugged"));
    tokio::time::timeout(WAIT, h.restarter.wait()).await.unwrap();

    // Grace period before restarting
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(h.ctx.is_resetting());
    assert!(!h.bridge.session().is_active());
}

#[tokio::test(start_paused = true)]
async fn test_serial_write_failure_resets() {
    let (mut h, mut peer) = Harness::connected().await;
    h.serial_out.set_failing(true);

    peer.to_bridge.push("+1.00E+00\n");
    tokio::time::timeout(WAIT, h.restarter.wait()).await.unwrap();
    assert_eq!(h.restarter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_faults_ignored_in_configuration_mode() {
    let mut h = Harness::start_with(BridgeConfig::default(), |ctx, connector| {
        ctx.set_configuration_mode(true);
        connector.refuse_all(true);
    });

    h.expect_serial(MSG_DISCONNECTED).await;
    tokio::time::sleep(QUIET).await;
    assert_eq!(h.restarter.count(), 0);
    assert!(!h.ctx.is_resetting());
    assert!(h.connector.attempt_count() > 1);

    // Leaving configuration mode lets the next failure through
    h.ctx.set_configuration_mode(false);
    tokio::time::timeout(WAIT, h.restarter.wait()).await.unwrap();
    assert!(h.ctx.is_resetting());
}

#[tokio::test(start_paused = true)]
async fn test_workers_stop_when_resetting() {
    let (h, _peer) = Harness::connected().await;

    h.ctx.begin_reset();
    tokio::time::timeout(WAIT, h.tasks.join()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot() {
    let (h, _peer) = Harness::connected().await;
    h.ctx.toggle_log_msgs();

    let status = h.bridge.status();
    assert!(status.session.active);
    assert_eq!(status.session.endpoint, Some(RemoteEndpoint::default()));
    assert!(status.log_msgs);
    assert!(!status.timeout_armed);
    assert!(!status.resetting);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let (h, _peer) = Harness::connected().await;
    let (source, _handle) = mock_source(ChannelKind::Serial);
    assert!(h.bridge.start(Box::new(source)).is_err());
}
