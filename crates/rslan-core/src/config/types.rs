//! Persisted parameter types.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_MAGIC, DEFAULT_GATEWAY, DEFAULT_LOCAL_IP, DEFAULT_MAC, DEFAULT_NETMASK,
    DEFAULT_REMOTE_ADDR, DEFAULT_REMOTE_PORT,
};
use crate::error::Error;

/// Remote TCP peer the bridge connects to.
///
/// Records without the expected magic marker are treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Validity marker, [`CONFIG_MAGIC`] for a good record.
    #[serde(default)]
    pub magic: u32,
    /// Peer IPv4 address.
    pub addr: Ipv4Addr,
    /// Peer TCP port.
    pub port: u16,
}

impl RemoteEndpoint {
    /// Create a valid endpoint record.
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self {
            magic: CONFIG_MAGIC,
            addr,
            port,
        }
    }

    /// Whether the record carries the validity marker.
    pub fn is_valid(&self) -> bool {
        self.magic == CONFIG_MAGIC
    }

    /// Socket address to connect to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.addr, self.port))
    }
}

impl Default for RemoteEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_ADDR, DEFAULT_REMOTE_PORT)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput {
            field: "MAC address",
            value: s.to_string(),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(MacAddr(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

/// Local network identity of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            mac: MacAddr(DEFAULT_MAC),
            ip: DEFAULT_LOCAL_IP,
            netmask: DEFAULT_NETMASK,
            gateway: DEFAULT_GATEWAY,
        }
    }
}

/// Parse a dotted-quad IPv4 address typed by the operator.
pub fn parse_ipv4(field: &'static str, input: &str) -> Result<Ipv4Addr, Error> {
    input.trim().parse().map_err(|_| Error::InvalidInput {
        field,
        value: input.to_string(),
    })
}

/// Parse a TCP port typed by the operator.
pub fn parse_port(input: &str) -> Result<u16, Error> {
    input.trim().parse().map_err(|_| Error::InvalidInput {
        field: "port",
        value: input.to_string(),
    })
}
