//! Datagram I/O and the event-driven dispatch layer built on top of it.
//!
//! [`netio::NetIO`] is the abstract transport contract (§4.6);
//! [`netio::UdpNetIO`] is its UDP specialization. [`listener::AuthListener`]
//! binds frameset-type codes to handler actions (§4.9), with an
//! overridable [`listener::SenderAuthenticator`] seam replacing the
//! original's open TODO about authenticating a frameset's sender.

pub mod error;
pub mod listener;
pub mod netio;

pub use error::NetError;
pub use listener::{AllowAllAuthenticator, AuthListener, SenderAuthenticator};
pub use netio::{NetIO, UdpNetIO};
