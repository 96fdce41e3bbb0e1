//! Agent-level glue: configuration, persisted state (PID file, key
//! directory), the discovery collector interface, and the startup
//! handshake driver. The CLI binary (`src/main.rs`) wires these into a
//! running nanoprobe.

pub mod config;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod keydir;
pub mod pidfile;

pub use config::ConfigContext;
pub use discovery::{ChildOutputReader, DiscoveryCollector, DiscoveryRunner, OsFactsCollector};
pub use error::AgentError;
pub use handshake::{HandshakeAction, HandshakeState, HeartbeatTarget, StartupHandshake};
pub use keydir::load_key_directory;
pub use pidfile::PidFile;
