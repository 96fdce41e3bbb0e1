//! [`FsProtocol`]: owns every live connection and routes inbound/outbound
//! traffic to the right [`FsProtoElem`].
//!
//! Grounded in the design note on cyclic ref-count risk (spec §9): rather
//! than giving each [`FsProtoElem`] a back-reference to its owning
//! protocol (the original's manually-reference-counted pattern), this type
//! holds a plain `HashMap` keyed by `(endpoint, queue_id)` and every method
//! that needs to touch a connection does so by looking it up here first.
//! No connection ever reaches back into this map on its own.

use std::collections::HashMap;

use nanoprobe_proto::NetAddr;

use crate::error::TransportError;
use crate::fsprotoelem::{Action, FsProtoElem};

/// Key identifying one connection: a peer endpoint plus a queue id (nanoprobe
/// framesets on different queue ids to the same peer are independent
/// streams with no cross-queue ordering guarantee, per spec §5).
pub type ConnKey = (NetAddr, u16);

/// Owns every `(endpoint, queue_id)` connection this process currently has
/// state for.
#[derive(Debug, Default)]
pub struct FsProtocol {
    connections: HashMap<ConnKey, FsProtoElem>,
    next_session_id: u32,
}

impl FsProtocol {
    /// Creates an empty protocol instance. `first_session_id` seeds the
    /// session-id generator used for connections this side initiates.
    #[must_use]
    pub fn new(first_session_id: u32) -> Self {
        FsProtocol { connections: HashMap::new(), next_session_id: first_session_id }
    }

    /// Looks up or creates the connection for `endpoint`/`queue_id`,
    /// assigning it a fresh session id if it's new.
    fn connection_mut(&mut self, endpoint: &NetAddr, queue_id: u16) -> &mut FsProtoElem {
        let next_session_id = &mut self.next_session_id;
        self.connections.entry((endpoint.clone(), queue_id)).or_insert_with(|| {
            let session_id = *next_session_id;
            *next_session_id = next_session_id.wrapping_add(1);
            FsProtoElem::new(endpoint.clone(), queue_id, session_id)
        })
    }

    /// Number of connections currently tracked (any state, including
    /// mid-shutdown).
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the connection state for `endpoint`/`queue_id`, if one
    /// exists.
    #[must_use]
    pub fn get(&self, endpoint: &NetAddr, queue_id: u16) -> Option<&FsProtoElem> {
        self.connections.get(&(endpoint.clone(), queue_id))
    }

    /// Submits `frameset` for reliable delivery to `endpoint` on
    /// `queue_id`, creating the connection if this is the first send.
    pub fn send(
        &mut self,
        endpoint: &NetAddr,
        queue_id: u16,
        frameset: nanoprobe_proto::FrameSet,
    ) -> Result<Vec<Action>, TransportError> {
        self.connection_mut(endpoint, queue_id).send(0, frameset)
    }

    /// Routes one inbound frameset, decoded from a datagram received from
    /// `source`, to the connection for `source`/`queue_id` (read off the
    /// frameset's own seqno frame, or queue 0 for seqno-less control
    /// framesets).
    pub fn receive(
        &mut self,
        now: u64,
        source: &NetAddr,
        frameset: nanoprobe_proto::FrameSet,
    ) -> Result<Vec<Action>, TransportError> {
        let queue_id = frameset.seqno().map_or(0, |(_, queue_id, _)| queue_id);
        self.connection_mut(source, queue_id).handle_received(now, frameset)
    }

    /// Drives every connection's retransmit/shutdown-timeout logic for the
    /// current time, collecting the actions of all of them. Connections
    /// that report [`Action::ConnectionClosed`] are removed from the map
    /// after their final actions are returned.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut closed = Vec::new();
        for (key, conn) in &mut self.connections {
            let conn_actions = conn.tick(now);
            if conn_actions.iter().any(|a| matches!(a, Action::ConnectionClosed { .. })) {
                closed.push(key.clone());
            }
            actions.extend(conn_actions);
        }
        for key in closed {
            self.connections.remove(&key);
        }
        actions
    }

    /// Begins a graceful shutdown of the connection to `endpoint`/`queue_id`,
    /// if one exists.
    pub fn close(&mut self, endpoint: &NetAddr, queue_id: u16) -> Vec<Action> {
        let Some(conn) = self.connections.get_mut(&(endpoint.clone(), queue_id)) else {
            return Vec::new();
        };
        let actions = conn.close();
        if actions.iter().any(|a| matches!(a, Action::ConnectionClosed { .. })) {
            self.connections.remove(&(endpoint.clone(), queue_id));
        }
        actions
    }
}
