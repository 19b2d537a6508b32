//! Persisted parameters: remote endpoint and local network identity.

mod store;
mod types;

pub use store::{
    ConfigStore, FileConfigStore, local_or_defaults, remote_or_defaults, set_defaults,
    set_local_defaults, set_remote_defaults,
};
pub use types::{MacAddr, NetConfig, RemoteEndpoint, parse_ipv4, parse_port};
