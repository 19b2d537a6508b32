//! In-memory parameter store.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rslan_core::config::{ConfigStore, NetConfig, RemoteEndpoint};
use rslan_core::error::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    remote: Mutex<Option<RemoteEndpoint>>,
    local: Mutex<Option<NetConfig>>,
    remote_loads: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryConfigStore {
    /// Empty store; the first query writes defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a remote endpoint.
    pub fn with_remote(endpoint: RemoteEndpoint) -> Self {
        let store = Self::new();
        *store.remote.lock().unwrap_or_else(|e| e.into_inner()) = Some(endpoint);
        store
    }

    /// Replace the stored endpoint without going through the trait.
    pub fn set_remote(&self, endpoint: RemoteEndpoint) {
        *self.remote.lock().unwrap_or_else(|e| e.into_inner()) = Some(endpoint);
    }

    /// Currently stored endpoint.
    pub fn remote(&self) -> Option<RemoteEndpoint> {
        *self.remote.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Currently stored local identity.
    pub fn local(&self) -> Option<NetConfig> {
        *self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// How many times the remote endpoint was loaded.
    pub fn remote_loads(&self) -> usize {
        self.remote_loads.load(Ordering::SeqCst)
    }

    /// Make every operation fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::config("injected store failure"));
        }
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_remote(&self) -> Result<Option<RemoteEndpoint>> {
        self.remote_loads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.remote())
    }

    fn save_remote(&self, endpoint: &RemoteEndpoint) -> Result<()> {
        self.check()?;
        self.set_remote(*endpoint);
        Ok(())
    }

    fn load_local_network(&self) -> Result<Option<NetConfig>> {
        self.check()?;
        Ok(self.local())
    }

    fn save_local_network(&self, config: &NetConfig) -> Result<()> {
        self.check()?;
        *self.local.lock().unwrap_or_else(|e| e.into_inner()) = Some(*config);
        Ok(())
    }
}
