//! Process wiring: open the instrument, start the bridge, feed the watchdog.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{info, warn};

use rslan_core::channel::{Connector, SimulatedConnector, TcpConnector, open_serial};
use rslan_core::config::{ConfigStore, FileConfigStore, local_or_defaults, remote_or_defaults};
use rslan_core::fault::StartReason;
use rslan_core::indicator::LogIndicator;
use rslan_core::watchdog::Watchdog;
use rslan_core::{Bridge, BridgeContext, BridgeParts, LogGate, Result};

use crate::cli::Cli;
use crate::console;

/// Run the bridge until interrupted or restarted.
pub async fn run(cli: Cli, gate: LogGate) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "rslan serial-to-TCP bridge");
    info!(reason = %StartReason::from_env(), "Start reason");

    let ctx = Arc::new(BridgeContext::with_log_gate(gate));
    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(&cli.config));

    let local = local_or_defaults(store.as_ref())?;
    info!(
        mac = %local.mac,
        ip = %local.ip,
        netmask = %local.netmask,
        gateway = %local.gateway,
        "Local network configuration"
    );
    let remote = remote_or_defaults(store.as_ref())?;
    info!(%remote, "Remote endpoint");

    let (serial_rx, serial_tx) = open_serial(&cli.device, cli.baud)?;

    let connector: Arc<dyn Connector> = if cli.simulate {
        warn!("Simulation mode, no network traffic");
        Arc::new(SimulatedConnector::new())
    } else {
        Arc::new(TcpConnector::new())
    };

    let restarter = cli.restarter();
    let bridge = Bridge::new(
        ctx.clone(),
        cli.bridge_config(),
        BridgeParts {
            store,
            connector,
            serial_sink: Box::new(serial_tx),
            restarter: restarter.clone(),
            indicator: Arc::new(LogIndicator::new()),
        },
    );
    let tasks = bridge.start(Box::new(serial_rx))?;

    let watchdog = Watchdog::new(cli.watchdog_timeout());
    tokio::spawn(watchdog.clone().monitor(restarter));

    if cli.console_enabled() {
        console::spawn(bridge.clone(), Some(watchdog.clone()), Handle::current())?;
    }

    let interrupted = tokio::select! {
        _ = watchdog.feed_loop(cli.watchdog_feed_interval(), ctx.clone()) => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        info!("Interrupted, shutting down");
        ctx.begin_reset();
        bridge.session().abort();
        tasks.abort();
        return Ok(());
    }

    // A fault is resetting the bridge. The fault handler or the watchdog
    // replaces the process; until then the runtime must stay up.
    tasks.join().await;
    std::future::pending::<()>().await;
    Ok(())
}
