//! Reliable, ordered delivery of framesets over an unreliable datagram
//! transport.
//!
//! This crate owns the `(endpoint, queue_id)` connection state machine
//! ([`fsprotoelem`]), the send/receive queue structure it's built on
//! ([`fsqueue`]), and the top-level map of every live connection
//! ([`fsprotocol`]). Nothing here touches a socket or a clock directly:
//! every state-machine method takes the current time as a plain `u64` of
//! microseconds and returns a list of [`fsprotoelem::Action`]s for the
//! caller (`nanoprobe-net`) to carry out. See [`env::Environment`] for how
//! production and test callers plug in their own notion of time.

pub mod env;
pub mod error;
pub mod fsprotocol;
pub mod fsprotoelem;
pub mod fsqueue;

pub use env::Environment;
pub use error::TransportError;
pub use fsprotocol::FsProtocol;
pub use fsprotoelem::{Action, FsProtoElem, FsProtoState};
