//! [`FsProtoElem`]: the per-endpoint, per-queue connection state machine.
//!
//! Like the teacher's `Connection` type, this is a pure state machine: every
//! method takes the current time and an input, and returns the list of
//! [`Action`]s the caller must carry out (send bytes, schedule a timer,
//! deliver a frameset to the application). No socket, no clock, no I/O
//! happens inside this module — that keeps it deterministically testable
//! and lets `nanoprobe-net` own every side effect.
//!
//! Time is represented as microseconds since an arbitrary epoch (`u64`),
//! matching the original's `gint64` microsecond timestamps for
//! `nextrexmit`/`acktimeout` — the driver converts its [`crate::env::Environment::Instant`]
//! to this representation once per tick rather than this module depending
//! on any particular clock type.

use nanoprobe_proto::opcodes::{frame_type, frameset_type};
use nanoprobe_proto::{Frame, FrameSet, NetAddr};

use crate::error::TransportError;
use crate::fsqueue::FsQueue;

/// Window size: maximum number of unacknowledged outbound framesets before
/// sends are refused until some are acked.
pub const WINDOW_SIZE: usize = 7;

/// Default interval between retransmission attempts, in microseconds.
pub const DEFAULT_REXMIT_INTERVAL_US: u64 = 2_000_000;

/// Retransmission attempts before the connection gives up on a sequence
/// number and tears itself down.
pub const MAX_RETRIES: u32 = 6;

/// Connection lifecycle state. Mirrors the original's `FsProtoState` enum
/// one-for-one, including its numeric ordering (`FSPR_ISSHUTDOWN` there is
/// `state >= Shut1` here, preserved as [`FsProtoState::is_shutdown`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FsProtoState {
    /// No connection in progress.
    None,
    /// Connection initiated, awaiting the first ACK from the far side.
    Init,
    /// Connection fully established: at least one ACK has been received.
    Up,
    /// Waiting on a CONNSHUT frameset and its ACK.
    Shut1,
    /// Received a CONNSHUT frameset; waiting for our own output to drain.
    Shut2,
    /// Output drained; waiting for the peer's CONNSHUT.
    Shut3,
}

impl FsProtoState {
    /// `true` for any state that's part of an in-progress or completed
    /// shutdown.
    #[must_use]
    pub fn is_shutdown(self) -> bool {
        self >= FsProtoState::Shut1
    }
}

/// A side effect for the driver to carry out. Produced by every
/// [`FsProtoElem`] method instead of being performed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send `frameset` to `to` now.
    SendFrameSet {
        /// Destination address.
        to: NetAddr,
        /// Frameset to transmit.
        frameset: FrameSet,
    },
    /// Deliver a fully in-order, deduplicated frameset to the application.
    DeliverToApp(FrameSet),
    /// The connection has finished shutting down and should be removed from
    /// its owning [`crate::fsprotocol::FsProtocol`] map.
    ConnectionClosed {
        /// Why the connection closed.
        reason: String,
    },
}

/// The connection state for one `(endpoint, queue_id)` pair.
#[derive(Debug)]
pub struct FsProtoElem {
    endpoint: NetAddr,
    queue_id: u16,
    session_id: u32,
    state: FsProtoState,
    outq: FsQueue,
    inq: FsQueue,
    next_send_seqno: u64,
    next_expected_seqno: u64,
    last_acked_sent: u64,
    rexmit_interval_us: u64,
}

impl FsProtoElem {
    /// Creates a new, unconnected element for `endpoint`/`queue_id` with a
    /// freshly assigned `session_id`.
    #[must_use]
    pub fn new(endpoint: NetAddr, queue_id: u16, session_id: u32) -> Self {
        FsProtoElem {
            endpoint,
            queue_id,
            session_id,
            state: FsProtoState::None,
            outq: FsQueue::new(),
            inq: FsQueue::new(),
            next_send_seqno: 1,
            next_expected_seqno: 1,
            last_acked_sent: 0,
            rexmit_interval_us: DEFAULT_REXMIT_INTERVAL_US,
        }
    }

    /// The endpoint this element talks to.
    #[must_use]
    pub fn endpoint(&self) -> &NetAddr {
        &self.endpoint
    }

    /// The queue id this element was keyed by.
    #[must_use]
    pub fn queue_id(&self) -> u16 {
        self.queue_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FsProtoState {
        self.state
    }

    /// Current session id.
    #[must_use]
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Overrides the retransmit interval (used by tests; production leaves
    /// this at [`DEFAULT_REXMIT_INTERVAL_US`]).
    pub fn set_rexmit_interval_us(&mut self, interval: u64) {
        self.rexmit_interval_us = interval;
    }

    /// Enqueues `frameset` for delivery, tagging it with the next sequence
    /// number and transitioning `None -> Init` if this is the first send.
    ///
    /// Returns [`TransportError::InvalidState`] if the connection is already
    /// shutting down — you can't start new sends on a connection that's on
    /// its way out.
    pub fn send(&mut self, now: u64, mut frameset: FrameSet) -> Result<Vec<Action>, TransportError> {
        if self.state.is_shutdown() {
            return Err(TransportError::InvalidState { state: self.state, operation: "send".into() });
        }
        if self.outq_len() >= WINDOW_SIZE {
            return Err(TransportError::InvalidState { state: self.state, operation: "send (window full)".into() });
        }

        let seqno = self.next_send_seqno;
        self.next_send_seqno += 1;
        frameset.prepend(Frame::Seqno { session_id: self.session_id, request_id: seqno, queue_id: self.queue_id });

        self.outq.enqueue_outbound(seqno, frameset.clone(), now + self.rexmit_interval_us);
        if self.state == FsProtoState::None {
            self.state = FsProtoState::Init;
        }

        Ok(vec![Action::SendFrameSet { to: self.endpoint.clone(), frameset }])
    }

    /// Number of outbound framesets awaiting acknowledgement.
    #[must_use]
    pub fn outq_len(&self) -> usize {
        self.outq.outbound_len()
    }

    /// Processes one inbound frameset from `self.endpoint`, dispatching by
    /// frameset type: control framesets (ACK, CONN_NAK) update connection
    /// bookkeeping directly; everything else goes through
    /// [`FsProtoElem::handle_data`] for sequencing and delivery.
    pub fn handle_received(&mut self, now: u64, frameset: FrameSet) -> Result<Vec<Action>, TransportError> {
        match frameset.fstype {
            t if t == frameset_type::ACK => {
                let (_, _, through) = frameset.seqno().ok_or(TransportError::MissingSeqno)?;
                Ok(self.handle_ack(through))
            }
            t if t == frameset_type::CONN_NAK => {
                self.state = FsProtoState::None;
                self.next_send_seqno = 1;
                Ok(vec![Action::ConnectionClosed { reason: "peer sent CONN_NAK".into() }])
            }
            t if t == frameset_type::CONNSHUT => Ok(self.handle_connshut()),
            _ => self.handle_data(now, frameset),
        }
    }

    /// Processes an inbound CONNSHUT frameset per the shutdown half of the
    /// state table: `Up -> Shut2` (drain our in-queue, then answer with our
    /// own CONNSHUT once there's nothing left to deliver), or
    /// `Shut1 -> Shut3` (we'd already asked to shut down; the peer's
    /// CONNSHUT crossed ours, so just wait for our own output to drain).
    fn handle_connshut(&mut self) -> Vec<Action> {
        match self.state {
            FsProtoState::Shut1 => {
                self.state = FsProtoState::Shut3;
                Vec::new()
            }
            _ if self.state.is_shutdown() => Vec::new(),
            _ => {
                self.state = FsProtoState::Shut2;
                if self.inq.inbound_pending() == 0 {
                    return self.finish_shut2();
                }
                Vec::new()
            }
        }
    }

    /// Emits our own CONNSHUT once `Shut2`'s drain condition is satisfied
    /// and advances to `Shut3`.
    fn finish_shut2(&mut self) -> Vec<Action> {
        self.state = FsProtoState::Shut3;
        vec![Action::SendFrameSet {
            to: self.endpoint.clone(),
            frameset: FrameSet::new(frameset_type::CONNSHUT),
        }]
    }

    /// Processes one inbound data-bearing frameset. Validates the session
    /// id, records the sequence number, drains any now-contiguous run of
    /// inbound framesets to the application, and always emits an ACK (even
    /// for duplicates — the peer may not have seen our previous one).
    fn handle_data(&mut self, now: u64, frameset: FrameSet) -> Result<Vec<Action>, TransportError> {
        let _ = now;
        let Some((session_id, queue_id, seqno)) = frameset.seqno() else {
            return Err(TransportError::MissingSeqno);
        };
        let _ = queue_id;

        if self.state == FsProtoState::None {
            // First contact from the peer: adopt their session id and move
            // to Up directly — we don't require our own Init handshake to
            // have completed first for the *receiving* side of a pair.
            self.session_id = session_id;
            self.state = FsProtoState::Up;
        } else if session_id != self.session_id {
            let nak = build_nak(self.session_id, self.queue_id);
            self.state = FsProtoState::None;
            self.next_send_seqno = 1;
            self.next_expected_seqno = 1;
            return Ok(vec![Action::SendFrameSet { to: self.endpoint.clone(), frameset: nak }]);
        } else if self.state == FsProtoState::Init {
            self.state = FsProtoState::Up;
        }

        let mut actions = Vec::new();
        if !self.inq.has_inbound(seqno) && seqno >= self.next_expected_seqno {
            self.inq.receive_inbound(seqno, strip_seqno(frameset));
            let (released, next_expected) = self.inq.drain_in_order(self.next_expected_seqno);
            self.next_expected_seqno = next_expected;
            actions.extend(released.into_iter().map(Action::DeliverToApp));
        }

        if self.state == FsProtoState::Shut2 && self.inq.inbound_pending() == 0 {
            actions.extend(self.finish_shut2());
        }

        let is_duplicate = seqno < self.next_expected_seqno;
        if self.next_expected_seqno > self.last_acked_sent + 1 || self.last_acked_sent == 0 || is_duplicate {
            self.last_acked_sent = self.next_expected_seqno.saturating_sub(1);
            actions.push(Action::SendFrameSet {
                to: self.endpoint.clone(),
                frameset: build_ack(self.session_id, self.queue_id, self.last_acked_sent),
            });
        }

        Ok(actions)
    }

    /// Processes a cumulative ACK from the peer, dropping every outbound
    /// entry it covers and transitioning `Init -> Up` on the first one.
    pub fn handle_ack(&mut self, through: u64) -> Vec<Action> {
        self.outq.ack_through(through);
        if self.state == FsProtoState::Init {
            self.state = FsProtoState::Up;
        }
        if self.state == FsProtoState::Shut1 && self.outq.is_fully_acked() {
            self.state = FsProtoState::Shut3;
            return vec![Action::ConnectionClosed { reason: "shutdown drained".into() }];
        }
        if self.state == FsProtoState::Shut3 && self.outq.is_fully_acked() {
            self.state = FsProtoState::None;
            return vec![Action::ConnectionClosed { reason: "final ack received".into() }];
        }
        Vec::new()
    }

    /// Scans for outbound entries whose retransmit deadline has passed and
    /// returns the frames to resend, advancing each one's deadline and
    /// retry counter. Entries that exceed [`MAX_RETRIES`] cause the
    /// connection to close instead of retransmitting again.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let due = self.outq.due_for_retransmit(now);
        let mut actions = Vec::new();
        for (seqno, frameset) in due {
            match self.outq.reschedule(seqno, now + self.rexmit_interval_us) {
                Some(retries) if retries > MAX_RETRIES => {
                    self.state = FsProtoState::None;
                    actions.push(Action::ConnectionClosed {
                        reason: format!("ack timeout for seqno {seqno} after {retries} retries"),
                    });
                    return actions;
                }
                Some(_) => {
                    actions.push(Action::SendFrameSet { to: self.endpoint.clone(), frameset });
                }
                None => {}
            }
        }
        actions
    }

    /// Begins a graceful shutdown: sends a CONNSHUT frameset and moves to
    /// `Shut1`. If there's nothing outstanding, the connection closes
    /// immediately instead.
    pub fn close(&mut self) -> Vec<Action> {
        if self.state.is_shutdown() {
            return Vec::new();
        }
        self.state = FsProtoState::Shut1;
        let shut = FrameSet::new(frameset_type::CONNSHUT);
        if self.outq.is_fully_acked() {
            self.state = FsProtoState::Shut3;
            return vec![
                Action::SendFrameSet { to: self.endpoint.clone(), frameset: shut },
                Action::ConnectionClosed { reason: "closed with no outstanding sends".into() },
            ];
        }
        vec![Action::SendFrameSet { to: self.endpoint.clone(), frameset: shut }]
    }
}

fn strip_seqno(mut frameset: FrameSet) -> FrameSet {
    frameset.frames.retain(|f| f.frame_type() != frame_type::SEQNO);
    frameset
}

fn build_ack(session_id: u32, queue_id: u16, through: u64) -> FrameSet {
    let mut fs = FrameSet::new(frameset_type::ACK);
    fs.append(Frame::Seqno { session_id, request_id: through, queue_id });
    fs
}

fn build_nak(session_id: u32, queue_id: u16) -> FrameSet {
    let mut fs = FrameSet::new(frameset_type::CONN_NAK);
    fs.append(Frame::Seqno { session_id, request_id: 0, queue_id });
    fs
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::net::Ipv4Addr;

    fn peer() -> NetAddr {
        NetAddr::V4(Ipv4Addr::new(10, 0, 0, 2), 1984)
    }

    fn payload() -> FrameSet {
        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(Frame::Int8(1));
        fs
    }

    #[test]
    fn first_send_moves_none_to_init() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        assert_eq!(elem.state(), FsProtoState::None);
        let actions = elem.send(0, payload()).unwrap();
        assert_eq!(elem.state(), FsProtoState::Init);
        assert!(matches!(actions.as_slice(), [Action::SendFrameSet { .. }]));
    }

    #[test]
    fn ack_moves_init_to_up() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        elem.send(0, payload()).unwrap();
        elem.handle_ack(1);
        assert_eq!(elem.state(), FsProtoState::Up);
        assert!(elem.outq.is_fully_acked());
    }

    #[test]
    fn session_mismatch_triggers_conn_nak() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        elem.send(0, payload()).unwrap();
        elem.handle_ack(1); // -> Up with session 100

        let mut foreign = payload();
        foreign.prepend(Frame::Seqno { session_id: 101, request_id: 1, queue_id: 0 });
        let actions = elem.handle_received(0, foreign).unwrap();
        assert!(matches!(
            actions.as_slice(),
            [Action::SendFrameSet { frameset, .. }] if frameset.fstype == frameset_type::CONN_NAK
        ));
        assert_eq!(elem.state(), FsProtoState::None, "a session mismatch must drop the connection back to None");
    }

    #[test]
    fn duplicate_delivery_is_suppressed_but_still_acked() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        let mut fs1 = payload();
        fs1.prepend(Frame::Seqno { session_id: 7, request_id: 1, queue_id: 0 });

        let first = elem.handle_received(0, fs1.clone()).unwrap();
        let delivered_first = first.iter().filter(|a| matches!(a, Action::DeliverToApp(_))).count();
        assert_eq!(delivered_first, 1);

        let second = elem.handle_received(0, fs1).unwrap();
        let delivered_second = second.iter().filter(|a| matches!(a, Action::DeliverToApp(_))).count();
        assert_eq!(delivered_second, 0, "duplicate must not be redelivered to the application");
        assert!(second.iter().any(|a| matches!(a, Action::SendFrameSet { frameset, .. } if frameset.fstype == frameset_type::ACK)));
    }

    #[test]
    fn out_of_order_arrival_is_released_once_gap_fills() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        let seq = |n: u64| {
            let mut fs = payload();
            fs.prepend(Frame::Seqno { session_id: 7, request_id: n, queue_id: 0 });
            fs
        };

        let r2 = elem.handle_received(0, seq(2)).unwrap();
        assert_eq!(r2.iter().filter(|a| matches!(a, Action::DeliverToApp(_))).count(), 0);

        let r1 = elem.handle_received(0, seq(1)).unwrap();
        assert_eq!(r1.iter().filter(|a| matches!(a, Action::DeliverToApp(_))).count(), 2);
    }

    #[test]
    fn close_with_nothing_outstanding_closes_immediately() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        let actions = elem.close();
        assert_eq!(elem.state(), FsProtoState::Shut3);
        assert!(actions.iter().any(|a| matches!(a, Action::ConnectionClosed { .. })));
    }

    #[test]
    fn inbound_connshut_drains_then_replies() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        elem.handle_received(0, {
            let mut fs = payload();
            fs.prepend(Frame::Seqno { session_id: 7, request_id: 1, queue_id: 0 });
            fs
        })
        .unwrap();

        let shut = FrameSet::new(frameset_type::CONNSHUT);
        let actions = elem.handle_received(0, shut).unwrap();
        assert_eq!(elem.state(), FsProtoState::Shut3);
        assert!(actions.iter().any(
            |a| matches!(a, Action::SendFrameSet { frameset, .. } if frameset.fstype == frameset_type::CONNSHUT)
        ));
    }

    #[test]
    fn no_sends_accepted_once_shutting_down() {
        let mut elem = FsProtoElem::new(peer(), 0, 100);
        elem.close();
        assert!(elem.send(0, payload()).is_err());
    }
}
