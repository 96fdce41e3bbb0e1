//! [`FsQueue`]: a per-session, per-direction queue of sequenced framesets.
//!
//! The same structure does double duty as both the outbound queue (holding
//! sent-but-unacknowledged framesets, tracked for retransmission) and the
//! inbound queue (holding received-but-out-of-order framesets, held until
//! the gap in front of them fills in) — exactly as the original's
//! `FsProtoElem` keeps one `FsQueue` for each direction (`outq`/`inq`) using
//! the same type.

use std::collections::BTreeMap;

use nanoprobe_proto::FrameSet;

/// One entry awaiting acknowledgement in an outbound queue.
#[derive(Debug, Clone)]
struct OutboundEntry {
    frameset: FrameSet,
    next_rexmit: u64,
    retries: u32,
}

/// A sequenced queue of framesets for one `(session, queue_id)` pair, used
/// as either the outbound (unacked, pending retransmit) or inbound
/// (out-of-order, pending release) side of a connection.
#[derive(Debug, Default)]
pub struct FsQueue {
    outbound: BTreeMap<u64, OutboundEntry>,
    inbound: BTreeMap<u64, FrameSet>,
}

impl FsQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `frameset` as sent under `seqno`, due for its first
    /// retransmission check at `now + rexmit_interval`.
    pub fn enqueue_outbound(&mut self, seqno: u64, frameset: FrameSet, first_rexmit_at: u64) {
        self.outbound
            .insert(seqno, OutboundEntry { frameset, next_rexmit: first_rexmit_at, retries: 0 });
    }

    /// Drops every outbound entry with sequence number `<= through`
    /// (cumulative ACK semantics: acknowledging N acknowledges everything up
    /// to and including N).
    pub fn ack_through(&mut self, through: u64) {
        self.outbound.retain(|&seqno, _| seqno > through);
    }

    /// Highest sequence number currently unacknowledged, if any are
    /// outstanding.
    #[must_use]
    pub fn highest_unacked(&self) -> Option<u64> {
        self.outbound.keys().next_back().copied()
    }

    /// `true` if every sent frameset has been acknowledged.
    #[must_use]
    pub fn is_fully_acked(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Number of outbound framesets currently awaiting acknowledgement.
    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Every outbound entry whose retransmit deadline has passed, in
    /// sequence order. The caller is expected to resend them and then call
    /// [`FsQueue::reschedule`] to push their deadlines forward.
    #[must_use]
    pub fn due_for_retransmit(&self, now: u64) -> Vec<(u64, FrameSet)> {
        self.outbound
            .iter()
            .filter(|(_, entry)| entry.next_rexmit <= now)
            .map(|(&seqno, entry)| (seqno, entry.frameset.clone()))
            .collect()
    }

    /// Pushes `seqno`'s retransmit deadline to `next_rexmit_at` and
    /// increments its retry counter, returning the new retry count (or
    /// `None` if `seqno` is no longer outstanding, e.g. it was just acked).
    pub fn reschedule(&mut self, seqno: u64, next_rexmit_at: u64) -> Option<u32> {
        let entry = self.outbound.get_mut(&seqno)?;
        entry.next_rexmit = next_rexmit_at;
        entry.retries += 1;
        Some(entry.retries)
    }

    /// Number of retries so far for `seqno`, if it's still outstanding.
    #[must_use]
    pub fn retries(&self, seqno: u64) -> Option<u32> {
        self.outbound.get(&seqno).map(|e| e.retries)
    }

    /// Stores an inbound frameset under its sequence number. A duplicate
    /// (already-seen) sequence number silently overwrites the previous
    /// entry — both are the same bytes from the peer's point of view.
    pub fn receive_inbound(&mut self, seqno: u64, frameset: FrameSet) {
        self.inbound.insert(seqno, frameset);
    }

    /// `true` if `seqno` is already sitting in the inbound queue (a
    /// duplicate delivery the caller should ACK but not re-process).
    #[must_use]
    pub fn has_inbound(&self, seqno: u64) -> bool {
        self.inbound.contains_key(&seqno)
    }

    /// Pops every contiguous inbound entry starting at `next_expected`,
    /// returning them in order along with the sequence number one past the
    /// last one released (the new `next_expected`).
    pub fn drain_in_order(&mut self, mut next_expected: u64) -> (Vec<FrameSet>, u64) {
        let mut released = Vec::new();
        while let Some(frameset) = self.inbound.remove(&next_expected) {
            released.push(frameset);
            next_expected += 1;
        }
        (released, next_expected)
    }

    /// Number of framesets held in the inbound queue waiting for a gap to
    /// fill.
    #[must_use]
    pub fn inbound_pending(&self) -> usize {
        self.inbound.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use nanoprobe_proto::opcodes::frameset_type;

    fn fs(n: u64) -> FrameSet {
        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(nanoprobe_proto::Frame::Int8(n));
        fs
    }

    #[test]
    fn ack_through_drops_everything_up_to_and_including() {
        let mut q = FsQueue::new();
        q.enqueue_outbound(1, fs(1), 10);
        q.enqueue_outbound(2, fs(2), 10);
        q.enqueue_outbound(3, fs(3), 10);

        q.ack_through(2);

        assert_eq!(q.highest_unacked(), Some(3));
        assert!(!q.is_fully_acked());
    }

    #[test]
    fn retransmit_due_set_and_reschedule() {
        let mut q = FsQueue::new();
        q.enqueue_outbound(1, fs(1), 10);

        assert!(q.due_for_retransmit(5).is_empty());
        let due = q.due_for_retransmit(10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, 1);

        assert_eq!(q.reschedule(1, 20), Some(1));
        assert_eq!(q.retries(1), Some(1));
        assert!(q.due_for_retransmit(15).is_empty());
    }

    #[test]
    fn reschedule_nonexistent_entry_returns_none() {
        let mut q = FsQueue::new();
        assert_eq!(q.reschedule(99, 10), None);
    }

    #[test]
    fn in_order_drain_releases_contiguous_run_only() {
        let mut q = FsQueue::new();
        q.receive_inbound(1, fs(1));
        q.receive_inbound(2, fs(2));
        q.receive_inbound(4, fs(4)); // gap at 3

        let (released, next_expected) = q.drain_in_order(1);
        assert_eq!(released.len(), 2);
        assert_eq!(next_expected, 3);
        assert_eq!(q.inbound_pending(), 1);

        q.receive_inbound(3, fs(3));
        let (released, next_expected) = q.drain_in_order(3);
        assert_eq!(released.len(), 2);
        assert_eq!(next_expected, 5);
        assert_eq!(q.inbound_pending(), 0);
    }

    #[test]
    fn duplicate_inbound_detected() {
        let mut q = FsQueue::new();
        q.receive_inbound(1, fs(1));
        assert!(q.has_inbound(1));
        assert!(!q.has_inbound(2));
    }
}
