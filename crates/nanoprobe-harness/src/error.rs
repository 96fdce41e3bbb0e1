//! Error type for the simulation harness's socket glue.

use thiserror::Error;

/// Errors raised sending/receiving framesets over a simulated socket.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The simulated socket I/O call failed.
    #[error("simulated socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding a frameset failed.
    #[error("wire encoding error: {0}")]
    Protocol(#[from] nanoprobe_proto::ProtocolError),
}
