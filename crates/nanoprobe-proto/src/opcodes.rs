//! Frame-type and frameset-type code registries.
//!
//! Codes below `0x0100` are the wire-compatible core set every peer must
//! agree on: the generic frame shapes (binary/string/integer/address/...)
//! and the special ordering frames (signature/encryption/compression).
//! Codes `0x0100..=0x01FF` are this implementation's own control framesets
//! (startup handshake, heartbeats, acks); `0x0200` and up are parameter
//! frame types private to those framesets. Per-the private range is not
//! interoperability-critical and may be renumbered freely.

/// Frame types (the `T` in each nested TLV).
pub mod frame_type {
    /// Opaque binary blob, no further interpretation.
    pub const BINARY: u16 = 1;
    /// NUL-terminated C string.
    pub const CSTRING: u16 = 2;
    /// Name=value pair, both NUL-terminated strings back to back.
    pub const NVPAIR: u16 = 3;
    /// 1-byte unsigned integer.
    pub const INT1: u16 = 4;
    /// 2-byte unsigned integer, big-endian.
    pub const INT2: u16 = 5;
    /// 3-byte unsigned integer, big-endian.
    pub const INT3: u16 = 6;
    /// 4-byte unsigned integer, big-endian.
    pub const INT4: u16 = 7;
    /// 8-byte unsigned integer, big-endian.
    pub const INT8: u16 = 8;
    /// A [`crate::netaddr::NetAddr`], family-tagged.
    pub const ADDRESS: u16 = 9;
    /// An address plus a port, for endpoints that need both together.
    pub const IP_PORT: u16 = 10;
    /// A reliable-transport sequence number (session id + seq + queue id).
    pub const SEQNO: u16 = 11;
    /// Digital signature; must be the first frame in a frameset if present.
    pub const SIGNATURE: u16 = 12;
    /// Encryption wrapper; must come immediately after the signature frame
    /// (or first, if there is no signature).
    pub const ENCRYPTION: u16 = 13;
    /// Compression wrapper; must come immediately after signature and
    /// encryption frames, before any payload frames.
    pub const COMPRESSION: u16 = 14;

    /// First code of this implementation's private control-frameset frame
    /// types (parameters for STARTUP/SETCONFIG/SENDEXPECTHB/etc).
    pub const PRIVATE_PARAM_BASE: u16 = 0x0200;
}

/// Frameset types (the overall purpose of a [`crate::frameset::FrameSet`]).
pub mod frameset_type {
    /// Announces a nanoprobe to the bootstrap multicast group.
    pub const STARTUP: u16 = 0x0100;
    /// Collector response assigning the nanoprobe a unicast address/config.
    pub const SETCONFIG: u16 = 0x0101;
    /// Tells a nanoprobe which peers to heartbeat and at what interval.
    pub const SENDEXPECTHB: u16 = 0x0102;
    /// A heartbeat "I'm alive" announcement.
    pub const HEARTBEAT: u16 = 0x0103;
    /// Graceful connection shutdown, first phase.
    pub const CONNSHUT: u16 = 0x0104;
    /// Session-id mismatch rejection.
    pub const CONN_NAK: u16 = 0x0105;
    /// Discovery data report.
    pub const DISCOVERY: u16 = 0x0106;
    /// Cumulative acknowledgement of received sequence numbers.
    pub const ACK: u16 = 0x0107;
}

/// Sentinel frame type marking the end of a frameset's frame list on the
/// wire: a TLV header of type 0, length 0.
pub const END_OF_FRAMESET_TYPE: u16 = 0;
