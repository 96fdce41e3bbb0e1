//! TLV frame and frameset wire format for the nanoprobe transport.
//!
//! This crate owns the self-describing binary encoding: bounds-safe TLV
//! primitives, the closed set of frame variants, frameset assembly with its
//! signature/encryption/compression ordering invariant, the frameset/frame
//! type registries, and [`netaddr::NetAddr`] for naming endpoints. It does
//! not know about sockets, retransmission, or sessions — that's
//! `nanoprobe-core` and `nanoprobe-net`.

pub mod compress;
pub mod error;
pub mod frame;
pub mod frameset;
pub mod netaddr;
pub mod opcodes;
pub mod packet;
pub mod tlv;

pub use error::ProtocolError;
pub use frame::Frame;
pub use frameset::FrameSet;
pub use netaddr::NetAddr;
pub use packet::PacketDecoder;
