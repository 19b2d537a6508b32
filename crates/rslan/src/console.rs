//! Operator console.
//!
//! Reads single-character commands from stdin on a dedicated thread. The
//! settings editor runs in configuration mode, which silences logging and
//! holds off fault resets until the operator is done.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use sysinfo::System;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use rslan_core::config::{
    MacAddr, RemoteEndpoint, local_or_defaults, parse_ipv4, parse_port, remote_or_defaults,
    set_defaults,
};
use rslan_core::watchdog::Watchdog;
use rslan_core::{Bridge, Error, Result};

/// A console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Edit network and remote settings.
    Configure,
    /// Restore default settings.
    Defaults,
    /// Toggle echo of relayed lines.
    ToggleLogMsgs,
    /// Report uptime.
    Uptime,
    /// Report available memory.
    Memory,
    /// Dump bridge status.
    Status,
    /// Reset the bridge.
    Reset,
    /// Stop feeding the watchdog.
    WatchdogTest,
}

impl Command {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'c' => Some(Command::Configure),
            'C' => Some(Command::Defaults),
            'l' => Some(Command::ToggleLogMsgs),
            'u' => Some(Command::Uptime),
            'h' => Some(Command::Memory),
            'd' => Some(Command::Status),
            'r' => Some(Command::Reset),
            'w' => Some(Command::WatchdogTest),
            _ => None,
        }
    }
}

/// Console bound to an input and an output stream.
pub struct Console<R, W> {
    input: R,
    output: W,
    bridge: Arc<Bridge>,
    watchdog: Option<Arc<Watchdog>>,
    runtime: Handle,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(
        input: R,
        output: W,
        bridge: Arc<Bridge>,
        watchdog: Option<Arc<Watchdog>>,
        runtime: Handle,
    ) -> Self {
        Self {
            input,
            output,
            bridge,
            watchdog,
            runtime,
        }
    }

    /// Process commands until input ends or the bridge resets.
    pub fn run(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            if self.bridge.context().is_resetting() {
                break;
            }

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                debug!("Console input closed");
                break;
            }

            for command in line.chars().filter_map(Command::from_char) {
                self.execute(command)?;
                // The editor consumes the following lines itself.
                if command == Command::Configure {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Run one command.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let ctx = self.bridge.context().clone();

        match command {
            Command::Configure => {
                ctx.set_configuration_mode(true);
                let edited = self.edit_settings();
                ctx.set_configuration_mode(false);
                edited?;
                info!("Configuration saved");
            }
            Command::Defaults => set_defaults(self.bridge.store().as_ref()),
            Command::ToggleLogMsgs => {
                let enabled = ctx.toggle_log_msgs();
                info!(enabled, "Message logging");
            }
            Command::Uptime => info!(seconds = ctx.uptime().as_secs(), "Uptime"),
            Command::Memory => match available_memory() {
                Some(bytes) => info!(bytes, "Available memory"),
                None => info!("Available memory unknown"),
            },
            Command::Status => {
                let status = self.bridge.status();
                info!(
                    active = status.session.active,
                    endpoint = ?status.session.endpoint.map(|ep| ep.to_string()),
                    link_id = ?status.session.link_id,
                    timeout_armed = status.timeout_armed,
                    log_msgs = status.log_msgs,
                    configuration_mode = status.configuration_mode,
                    resetting = status.resetting,
                    uptime_s = status.uptime.as_secs(),
                    "Status"
                );
            }
            Command::Reset => {
                info!("Reset");
                let fault = self.bridge.fault().clone();
                self.runtime.spawn(async move { fault.trigger("operator reset").await });
            }
            Command::WatchdogTest => match &self.watchdog {
                Some(watchdog) => {
                    info!("Watchdog test, expect a restart");
                    watchdog.starve();
                }
                None => warn!("Watchdog not running"),
            },
        }
        Ok(())
    }

    fn edit_settings(&mut self) -> Result<()> {
        let store = self.bridge.store().clone();

        let mut local = local_or_defaults(store.as_ref())?;
        writeln!(self.output, "Local network")?;
        local.mac = self.prompt("MAC address", local.mac, |s| s.parse::<MacAddr>())?;
        local.ip = self.prompt("IP address", local.ip, |s| parse_ipv4("IP address", s))?;
        local.netmask = self.prompt("Netmask", local.netmask, |s| parse_ipv4("netmask", s))?;
        local.gateway = self.prompt("Gateway", local.gateway, |s| parse_ipv4("gateway", s))?;
        if let Err(e) = store.save_local_network(&local) {
            writeln!(self.output, "Failed to save network configuration: {e}")?;
        }

        let remote = remote_or_defaults(store.as_ref())?;
        writeln!(self.output, "Remote endpoint")?;
        let addr = self.prompt("Address", remote.addr, |s| parse_ipv4("address", s))?;
        let port = self.prompt("Port", remote.port, parse_port)?;
        if let Err(e) = store.save_remote(&RemoteEndpoint::new(addr, port)) {
            writeln!(self.output, "Failed to save remote address: {e}")?;
        }

        self.output.flush()?;
        Ok(())
    }

    /// Ask for one value until it parses. Empty input keeps `current`.
    fn prompt<T, F>(&mut self, label: &str, current: T, parse: F) -> Result<T>
    where
        T: Display,
        F: Fn(&str) -> Result<T>,
    {
        let mut line = String::new();
        loop {
            write!(self.output, "{label} [{current}]: ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "console input closed",
                )));
            }

            let value = line.trim();
            if value.is_empty() {
                return Ok(current);
            }
            match parse(value) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => writeln!(self.output, "{e}, try again")?,
            }
        }
    }
}

/// Start the console on its own thread, reading stdin.
pub fn spawn(
    bridge: Arc<Bridge>,
    watchdog: Option<Arc<Watchdog>>,
    runtime: Handle,
) -> Result<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("rslan-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut console = Console::new(stdin.lock(), io::stdout(), bridge, watchdog, runtime);
            if let Err(e) = console.run() {
                warn!(error = %e, "Console stopped");
            }
        })?;
    Ok(handle)
}

/// Available memory in bytes as reported by the OS.
pub fn available_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.available_memory() {
        0 => None,
        bytes => Some(bytes),
    }
}
