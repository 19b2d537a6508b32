//! Wire literals, timing and default values for rslan.

use std::net::Ipv4Addr;
use std::time::Duration;

// =============================================================================
// Notification Literals
// =============================================================================

/// Sent to the instrument when a TCP session has been established.
pub const MSG_CONNECTED: &[u8] = b"CONNECTED\n";

/// Sent to the instrument when no TCP session is available.
pub const MSG_DISCONNECTED: &[u8] = b"DISCONNECTED\n";

/// Sent to the instrument when a reply-expected command got no reply in time.
pub const MSG_TIMEOUT: &[u8] = b"TIMEOUT\n";

// =============================================================================
// Framing Constants
// =============================================================================

/// Size of the line buffer, newline included.
///
/// A read yields at most `MAX_LINE_LEN - 1` bytes, mirroring `fgets` on a
/// buffer of this size.
pub const MAX_LINE_LEN: usize = 256;

/// Line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Command prefixes that expect a reply from the instrument's peer.
pub const DEFAULT_RESPONSE_PREFIXES: &[&str] = &["READ", "MEAS"];

// =============================================================================
// Timing Constants
// =============================================================================

/// How long to wait for a reply to a reply-expected command.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Delay between connect attempts when the retry policy is selected.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Pause before restarting so serial writes and socket close can complete.
pub const RESET_GRACE: Duration = Duration::from_millis(250);

/// Upper bound for a single TCP connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Watchdog expiry.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(600);

/// Interval at which the supervisory loop feeds the watchdog.
pub const WATCHDOG_FEED_INTERVAL: Duration = Duration::from_millis(500);

/// Reply latency of the simulated instrument.
pub const SIMULATION_DELAY: Duration = Duration::from_millis(50);

// =============================================================================
// Serial Defaults
// =============================================================================

/// Default instrument UART speed.
pub const DEFAULT_BAUD: u32 = 38400;

/// Default instrument UART device.
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB0";

// =============================================================================
// Stored Configuration Defaults
// =============================================================================

/// Validity marker of a stored remote endpoint record.
pub const CONFIG_MAGIC: u32 = 0xdead_beaf;

/// Default remote peer address.
pub const DEFAULT_REMOTE_ADDR: Ipv4Addr = Ipv4Addr::new(10, 32, 96, 32);

/// Default remote peer port (SCPI raw socket).
pub const DEFAULT_REMOTE_PORT: u16 = 5025;

/// Default local MAC address.
pub const DEFAULT_MAC: [u8; 6] = [0x9e, 0x79, 0xcf, 0x6f, 0xd6, 0xc9];

/// Default local IP address.
pub const DEFAULT_LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 32, 96, 50);

/// Default local netmask.
pub const DEFAULT_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Default local gateway.
pub const DEFAULT_GATEWAY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Default path of the persisted parameter file.
pub const DEFAULT_CONFIG_PATH: &str = "rslan.json";

/// Environment variable carrying the reason for the last restart.
pub const RESTART_REASON_ENV: &str = "RSLAN_RESTART_REASON";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_literals_are_newline_terminated() {
        for msg in [MSG_CONNECTED, MSG_DISCONNECTED, MSG_TIMEOUT] {
            assert_eq!(msg.last(), Some(&LINE_TERMINATOR));
        }
    }

    #[test]
    fn timing_constants_are_ordered() {
        assert!(WATCHDOG_FEED_INTERVAL < WATCHDOG_TIMEOUT);
        assert!(RESPONSE_TIMEOUT < CONNECT_TIMEOUT);
    }

    #[test]
    fn default_prefixes_are_uppercase_scpi() {
        assert!(DEFAULT_RESPONSE_PREFIXES.contains(&"READ"));
        assert!(DEFAULT_RESPONSE_PREFIXES.contains(&"MEAS"));
    }
}
