//! Parameter storage.
//!
//! The bridge reads its remote endpoint through [`remote_or_defaults`] at every
//! connect attempt, so edits made on the console apply on the next reconnect.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::types::{NetConfig, RemoteEndpoint};
use crate::error::{Error, Result};

const REMOTE_SECTION: &str = "remote";
const LOCAL_SECTION: &str = "local";

/// Non-volatile parameter storage.
pub trait ConfigStore: Send + Sync {
    /// Load the stored remote endpoint, `None` if nothing usable is stored.
    fn load_remote(&self) -> Result<Option<RemoteEndpoint>>;

    /// Persist the remote endpoint.
    fn save_remote(&self, endpoint: &RemoteEndpoint) -> Result<()>;

    /// Load the stored local network identity.
    fn load_local_network(&self) -> Result<Option<NetConfig>>;

    /// Persist the local network identity.
    fn save_local_network(&self, config: &NetConfig) -> Result<()>;
}

/// Fetch the remote endpoint, regenerating defaults if the record is missing
/// or its validity marker is wrong.
pub fn remote_or_defaults(store: &dyn ConfigStore) -> Result<RemoteEndpoint> {
    match store.load_remote() {
        Ok(Some(endpoint)) if endpoint.is_valid() => return Ok(endpoint),
        Ok(_) => info!("No remote address available, starting with defaults"),
        Err(e) => warn!(error = %e, "Failed to read remote address, starting with defaults"),
    }

    set_remote_defaults(store);

    match store.load_remote() {
        Ok(Some(endpoint)) if endpoint.is_valid() => Ok(endpoint),
        _ => Ok(RemoteEndpoint::default()),
    }
}

/// Fetch the local network identity, regenerating defaults if missing.
pub fn local_or_defaults(store: &dyn ConfigStore) -> Result<NetConfig> {
    match store.load_local_network() {
        Ok(Some(config)) => return Ok(config),
        Ok(None) => info!("No network configuration available, starting with defaults"),
        Err(e) => warn!(error = %e, "Failed to read network configuration, starting with defaults"),
    }

    set_local_defaults(store);

    match store.load_local_network() {
        Ok(Some(config)) => Ok(config),
        _ => Ok(NetConfig::default()),
    }
}

/// Write the compiled-in remote endpoint.
pub fn set_remote_defaults(store: &dyn ConfigStore) {
    info!("Setting default remote address");
    match store.save_remote(&RemoteEndpoint::default()) {
        Ok(()) => info!("Saved remote address"),
        Err(e) => warn!(error = %e, "Failed to save remote address"),
    }
}

/// Write the compiled-in local network identity.
pub fn set_local_defaults(store: &dyn ConfigStore) {
    info!("Setting default network configuration");
    match store.save_local_network(&NetConfig::default()) {
        Ok(()) => info!("Saved network configuration"),
        Err(e) => warn!(error = %e, "Failed to save network configuration"),
    }
}

/// Write defaults for both sections.
pub fn set_defaults(store: &dyn ConfigStore) {
    set_local_defaults(store);
    set_remote_defaults(store);
}

/// JSON file backed store.
///
/// Both sections live in one document. A section that fails to parse is
/// reported as absent so that defaults get regenerated.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileConfigStore {
    /// Create a store for the given file. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Configuration file is corrupt, ignoring it");
                Ok(Map::new())
            }
        }
    }

    fn load_section<T: serde::de::DeserializeOwned>(&self, section: &str) -> Result<Option<T>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.read_document()?;

        let Some(value) = doc.get(section) else {
            return Ok(None);
        };

        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(section, error = %e, "Stored section is corrupt");
                Ok(None)
            }
        }
    }

    fn save_section<T: serde::Serialize>(&self, section: &str, value: &T) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document()?;

        let value = serde_json::to_value(value).map_err(Error::config)?;
        doc.insert(section.to_string(), value);

        let text = serde_json::to_string_pretty(&Value::Object(doc)).map_err(Error::config)?;

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn load_remote(&self) -> Result<Option<RemoteEndpoint>> {
        self.load_section(REMOTE_SECTION)
    }

    fn save_remote(&self, endpoint: &RemoteEndpoint) -> Result<()> {
        self.save_section(REMOTE_SECTION, endpoint)
    }

    fn load_local_network(&self) -> Result<Option<NetConfig>> {
        self.load_section(LOCAL_SECTION)
    }

    fn save_local_network(&self, config: &NetConfig) -> Result<()> {
        self.save_section(LOCAL_SECTION, config)
    }
}
