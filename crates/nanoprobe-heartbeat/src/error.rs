//! Error types for the heartbeat layer.

use thiserror::Error;

/// Errors raised by [`crate::sender::HbSender`] / [`crate::listener::HbListener`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    /// A sender for this destination is already registered.
    #[error("a heartbeat sender for {dest} is already registered")]
    AlreadyRegistered {
        /// Destination that was already registered.
        dest: String,
    },

    /// No sender is registered for the given destination.
    #[error("no heartbeat sender registered for {dest}")]
    NotRegistered {
        /// Destination that was looked up.
        dest: String,
    },
}
