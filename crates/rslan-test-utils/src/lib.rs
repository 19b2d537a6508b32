//! rslan-test-utils: Test infrastructure for rslan.
//!
//! Provides:
//! - Mock line channels with test-side handles
//! - MockConnector: scriptable network sessions
//! - MemoryConfigStore: parameter storage without files
//! - RecordingRestarter: restart requests without restarting

mod memory_store;
mod mock_channel;
mod mock_connector;
mod recording_restarter;

pub use memory_store::MemoryConfigStore;
pub use mock_channel::{MockSink, MockSource, SinkHandle, SourceHandle, mock_sink, mock_source};
pub use mock_connector::{MockConnector, PeerSession, PeerSessions};
pub use recording_restarter::RecordingRestarter;
