//! Error taxonomy for the wire format layer.

use thiserror::Error;

/// Everything that can go wrong turning bytes into frames, framesets, or
/// back again.
///
/// None of these are ever produced by `panic!`/`unwrap`/`expect`: every
/// variant here corresponds to a bounds or consistency check performed
/// against attacker-controlled bytes before any value is trusted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A TLV header claimed more value bytes than remained in the packet.
    #[error("truncated TLV: header claims {claimed} bytes, {available} available")]
    Truncated {
        /// Bytes the TLV header claimed.
        claimed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A frame or frameset exceeded [`crate::frame::MAX_FRAME_VALUE_LEN`] or
    /// the UDP packet ceiling.
    #[error("frame value too large: {len} bytes exceeds maximum of {max}")]
    TooLarge {
        /// Length that was rejected.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// A frame's value bytes were not valid UTF-8 where UTF-8 was required
    /// (e.g. a C-string frame).
    #[error("frame value is not valid UTF-8")]
    InvalidUtf8,

    /// A C-string frame's value was missing its trailing NUL.
    #[error("C-string frame missing NUL terminator")]
    MissingNulTerminator,

    /// A fixed-width integer frame (1/2/3/4/8-byte) had a value length that
    /// did not match its declared width.
    #[error("integer frame of width {expected} has value of length {actual}")]
    WrongIntegerWidth {
        /// Width the frame type requires.
        expected: usize,
        /// Width actually present.
        actual: usize,
    },

    /// An address frame's value didn't decode to a recognized [`crate::netaddr::NetAddr`] encoding.
    #[error("malformed address frame")]
    MalformedAddress,

    /// A sequence-number frame's value was the wrong width.
    #[error("malformed sequence number frame: expected {expected} bytes, got {actual}")]
    MalformedSeqno {
        /// Expected byte width.
        expected: usize,
        /// Actual byte width found.
        actual: usize,
    },

    /// The signature, encryption, or compression frame ordering invariant
    /// was violated: signature (if present) must be first, encryption
    /// second, compression third.
    #[error("frameset violates signature/encryption/compression ordering")]
    BadSpecialFrameOrder,

    /// A frameset's end-of-frameset sentinel (type=0, length=0) was missing
    /// or malformed.
    #[error("missing or malformed end-of-frameset sentinel")]
    MissingSentinel,

    /// An unknown frame type was encountered where a closed set was
    /// expected (e.g. a special frame slot).
    #[error("unexpected frame type {0:#06x} in this position")]
    UnexpectedFrameType(u16),

    /// Decompression would have produced more bytes than permitted.
    #[error("decompressed size {actual} exceeds limit of {limit}")]
    DecompressionTooLarge {
        /// Bytes the decompressor actually produced (or claimed to need).
        actual: usize,
        /// Configured decompression ceiling.
        limit: usize,
    },

    /// Compression or decompression itself failed (corrupt zlib stream).
    #[error("compression codec error: {0}")]
    CodecError(String),
}
