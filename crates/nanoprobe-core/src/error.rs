//! Error types for the reliable-transport layer.

use thiserror::Error;

use crate::fsprotoelem::FsProtoState;

/// Errors raised by the connection-level state machine ([`crate::fsprotoelem::FsProtoElem`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// An operation was attempted that isn't valid from the current state.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: FsProtoState,
        /// Operation that was attempted.
        operation: String,
    },

    /// A received frameset's session id didn't match the active session.
    #[error("session mismatch: expected {expected}, got {actual}")]
    SessionMismatch {
        /// Session id this connection believes is active.
        expected: u64,
        /// Session id the peer sent.
        actual: u64,
    },

    /// No ACK arrived before the retransmission budget was exhausted.
    #[error("ack timeout waiting for sequence {seqno} after {retries} retransmissions")]
    AckTimeout {
        /// Sequence number that was never acknowledged.
        seqno: u64,
        /// Number of retransmission attempts made.
        retries: u32,
    },

    /// A frameset arrived with no sequence-number frame where one was
    /// required.
    #[error("frameset missing required sequence number")]
    MissingSeqno,

    /// Underlying wire-format error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<nanoprobe_proto::ProtocolError> for TransportError {
    fn from(err: nanoprobe_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
