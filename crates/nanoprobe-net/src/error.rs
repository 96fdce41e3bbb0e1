//! Error taxonomy for the datagram I/O layer.

use thiserror::Error;

/// Errors raised binding, sending on, or receiving from a [`crate::netio::NetIO`].
#[derive(Debug, Error)]
pub enum NetError {
    /// The underlying OS socket call failed.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `send_framesets` was called before a signing frame was configured.
    #[error("no signing frame configured; call set_signing_frame first")]
    NoSigningFrame,

    /// A received datagram's leading signature frame didn't match any
    /// frame this implementation could verify (unknown key, bad MAC).
    #[error("signature verification failed for datagram from {source}")]
    SignatureRejected {
        /// Address the datagram claimed to be from.
        source: String,
    },

    /// Encoding a frameset for transmission failed.
    #[error("wire encoding error: {0}")]
    Protocol(#[from] nanoprobe_proto::ProtocolError),

    /// A cryptographic operation (sign/encrypt/decrypt) failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] nanoprobe_crypto::CryptoError),

    /// A datagram exceeded the configured maximum packet size.
    #[error("packet of {len} bytes exceeds the configured maximum of {max}")]
    PacketTooLarge {
        /// Size of the packet that was rejected.
        len: usize,
        /// Configured ceiling.
        max: usize,
    },
}
