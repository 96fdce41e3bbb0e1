//! Error taxonomy for agent-level concerns: config, PID file, key directory
//! loading, and discovery collectors. Wraps the lower-layer error types
//! rather than duplicating their variants.

use thiserror::Error;

/// Errors raised assembling or running the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Reading or parsing the JSON config file failed.
    #[error("config error: {0}")]
    Config(String),

    /// A required config key was absent.
    #[error("missing required config key: {0}")]
    MissingConfigKey(String),

    /// The PID file already names a process that is still alive.
    #[error("another instance is already running (pid {pid})")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
    },

    /// Filesystem I/O failed (PID file, key directory, config file).
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A key directory file didn't follow the `<key_id>.{pub,priv}` naming
    /// convention.
    #[error("key file {path} doesn't match the <key_id>.{{pub,priv}} naming convention")]
    MalformedKeyFilename {
        /// Offending file path.
        path: String,
    },

    /// A discovery collector's `collect()` call failed.
    #[error("discovery collector {collector} failed: {reason}")]
    DiscoveryFailed {
        /// Name of the collector that failed.
        collector: String,
        /// Human-readable cause.
        reason: String,
    },
}
