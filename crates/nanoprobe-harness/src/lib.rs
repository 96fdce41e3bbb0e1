//! Deterministic, `turmoil`-driven network simulation tests for the
//! reliable-transport and heartbeat layers: dropped packets, reordering,
//! session mismatch (§8 scenarios S3–S5). Test files live under `tests/`;
//! this crate only ships the simulated-socket glue they share.

pub mod error;
pub mod sim_net;

pub use error::HarnessError;
pub use sim_net::{host_addr, recv_framesets, send_frameset, send_with_one_shot_drops};
