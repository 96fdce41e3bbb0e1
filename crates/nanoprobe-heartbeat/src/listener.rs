//! [`HbListener`]: per-peer deadtime/warntime/come-alive tracking, and
//! [`HbMonitor`], the process-wide set of listeners plus martian-heartbeat
//! handling described in §4.8.
//!
//! Like [`crate::sender::HbSender`], both types are pure: they take `now`
//! and an input and return the events that occurred, rather than invoking
//! callbacks themselves. The driver in `nanoprobe-agent` owns turning
//! [`HbEvent`]s into actual callback invocations or log lines.

use std::collections::HashMap;

use nanoprobe_proto::NetAddr;

use crate::error::HeartbeatError;

/// Liveness state of one monitored peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HbState {
    Alive,
    Dead,
}

/// An event produced by [`HbListener::on_heartbeat`] or [`HbListener::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HbEvent {
    /// A heartbeat was received from a live (or newly-revived) peer.
    Heartbeat,
    /// `warn_due` has passed with no heartbeat since.
    Warn {
        /// Microseconds past `warn_due` this scan is running at.
        howlate: u64,
    },
    /// `next_due` (deadtime) has passed with no heartbeat since; the peer
    /// transitions to DEAD.
    Dead,
    /// A heartbeat arrived from a peer that was DEAD; it transitions back
    /// to alive.
    ComeAlive {
        /// Microseconds past `next_due` the reviving heartbeat arrived at.
        howlate: u64,
    },
}

/// Tracks one peer's heartbeat liveness: `next_due` (deadtime deadline) and
/// `warn_due` (warntime deadline), both reset on every received heartbeat.
#[derive(Debug, Clone)]
pub struct HbListener {
    peer: NetAddr,
    deadtime_us: u64,
    warntime_us: u64,
    next_due: u64,
    warn_due: u64,
    warned: bool,
    state: HbState,
}

impl HbListener {
    /// Creates a listener for `peer`, with the first deadtime/warntime
    /// deadlines set relative to `now`.
    #[must_use]
    pub fn new(peer: NetAddr, deadtime_us: u64, warntime_us: u64, now: u64) -> Self {
        HbListener {
            peer,
            deadtime_us,
            warntime_us,
            next_due: now + deadtime_us,
            warn_due: now + warntime_us,
            warned: false,
            state: HbState::Alive,
        }
    }

    /// The peer this listener tracks.
    #[must_use]
    pub fn peer(&self) -> &NetAddr {
        &self.peer
    }

    /// `true` if this peer is currently considered dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state == HbState::Dead
    }

    /// Records a received heartbeat at `now`: resets both deadlines, and if
    /// the peer was DEAD, reports how late (past its prior deadtime
    /// deadline) the reviving heartbeat arrived.
    pub fn on_heartbeat(&mut self, now: u64) -> Vec<HbEvent> {
        let mut events = Vec::new();
        if self.state == HbState::Dead {
            let howlate = now.saturating_sub(self.next_due);
            self.state = HbState::Alive;
            events.push(HbEvent::ComeAlive { howlate });
        }
        self.next_due = now + self.deadtime_us;
        self.warn_due = now + self.warntime_us;
        self.warned = false;
        events.push(HbEvent::Heartbeat);
        events
    }

    /// Periodic liveness check, to be called at least every `warntime/2`
    /// per §4.8. Emits `Warn` once per missed warntime deadline and `Dead`
    /// exactly once per deadtime deadline passed with no heartbeat.
    pub fn scan(&mut self, now: u64) -> Vec<HbEvent> {
        let mut events = Vec::new();
        if self.state == HbState::Alive && !self.warned && now >= self.warn_due {
            self.warned = true;
            events.push(HbEvent::Warn { howlate: now.saturating_sub(self.warn_due) });
        }
        if self.state == HbState::Alive && now >= self.next_due {
            self.state = HbState::Dead;
            events.push(HbEvent::Dead);
        }
        events
    }
}

/// Process-wide registry of [`HbListener`]s, dispatching received
/// heartbeats by peer address and routing heartbeats from unregistered
/// peers ("martian" heartbeats, per §4.8) to a caller-visible return value
/// instead of a silent drop.
#[derive(Debug, Default)]
pub struct HbMonitor {
    listeners: HashMap<NetAddr, HbListener>,
}

impl HbMonitor {
    /// Creates an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        HbMonitor { listeners: HashMap::new() }
    }

    /// Registers a listener for `peer`. Fails with
    /// [`HeartbeatError::AlreadyRegistered`] if one is already registered;
    /// callers that want to replace a listener must [`HbMonitor::unregister`]
    /// it first.
    pub fn register(&mut self, listener: HbListener) -> Result<(), HeartbeatError> {
        let peer = listener.peer().clone();
        if self.listeners.contains_key(&peer) {
            return Err(HeartbeatError::AlreadyRegistered { dest: peer.to_string() });
        }
        self.listeners.insert(peer, listener);
        Ok(())
    }

    /// Removes the listener for `peer`. Fails with
    /// [`HeartbeatError::NotRegistered`] if none was registered.
    pub fn unregister(&mut self, peer: &NetAddr) -> Result<(), HeartbeatError> {
        self.listeners
            .remove(peer)
            .map(|_| ())
            .ok_or_else(|| HeartbeatError::NotRegistered { dest: peer.to_string() })
    }

    /// Routes a received heartbeat from `source`. Returns `Ok(events)` for a
    /// registered peer, or `Err(source)` (the martian case) for one that
    /// isn't — the caller decides how to handle the configurable
    /// process-wide martian callback described in §4.8.
    pub fn on_heartbeat(&mut self, source: &NetAddr, now: u64) -> Result<Vec<HbEvent>, NetAddr> {
        match self.listeners.get_mut(source) {
            Some(listener) => Ok(listener.on_heartbeat(now)),
            None => Err(source.clone()),
        }
    }

    /// Scans every registered listener, returning `(peer, events)` pairs
    /// for any peer that produced at least one event this scan.
    pub fn scan_all(&mut self, now: u64) -> Vec<(NetAddr, Vec<HbEvent>)> {
        self.listeners
            .iter_mut()
            .filter_map(|(peer, listener)| {
                let events = listener.scan(now);
                if events.is_empty() { None } else { Some((peer.clone(), events)) }
            })
            .collect()
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::net::Ipv4Addr;

    fn peer() -> NetAddr {
        NetAddr::V4(Ipv4Addr::new(10, 0, 0, 4), 1984)
    }

    #[test]
    fn heartbeat_before_deadtime_never_triggers_dead() {
        let mut listener = HbListener::new(peer(), 3_000_000, 1_000_000, 0);
        assert!(listener.scan(500_000).is_empty());
    }

    #[test]
    fn warn_then_dead_sequence() {
        let mut listener = HbListener::new(peer(), 3_000_000, 1_000_000, 0);
        let warn = listener.scan(1_000_000);
        assert_eq!(warn, vec![HbEvent::Warn { howlate: 0 }]);

        // Warn doesn't refire on a later scan.
        assert!(listener.scan(1_500_000).is_empty());

        let dead = listener.scan(3_000_000);
        assert_eq!(dead, vec![HbEvent::Dead]);
        assert!(listener.is_dead());
    }

    #[test]
    fn heartbeat_revives_dead_peer_with_lateness() {
        let mut listener = HbListener::new(peer(), 3_000_000, 1_000_000, 0);
        listener.scan(3_000_000);
        assert!(listener.is_dead());

        let events = listener.on_heartbeat(4_000_000);
        assert_eq!(events, vec![HbEvent::ComeAlive { howlate: 1_000_000 }, HbEvent::Heartbeat]);
        assert!(!listener.is_dead());
    }

    #[test]
    fn monitor_reports_martian_for_unregistered_peer() {
        let mut monitor = HbMonitor::new();
        assert_eq!(monitor.on_heartbeat(&peer(), 0), Err(peer()));
    }

    #[test]
    fn monitor_dispatches_to_registered_listener() {
        let mut monitor = HbMonitor::new();
        monitor.register(HbListener::new(peer(), 3_000_000, 1_000_000, 0)).unwrap();
        let events = monitor.on_heartbeat(&peer(), 100).unwrap();
        assert_eq!(events, vec![HbEvent::Heartbeat]);
    }

    #[test]
    fn scan_all_only_reports_peers_with_events() {
        let mut monitor = HbMonitor::new();
        monitor.register(HbListener::new(peer(), 3_000_000, 1_000_000, 0)).unwrap();
        assert!(monitor.scan_all(500_000).is_empty());
        let reported = monitor.scan_all(1_000_000);
        assert_eq!(reported.len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut monitor = HbMonitor::new();
        monitor.register(HbListener::new(peer(), 3_000_000, 1_000_000, 0)).unwrap();
        assert!(monitor.register(HbListener::new(peer(), 3_000_000, 1_000_000, 0)).is_err());
    }

    #[test]
    fn unregister_unknown_peer_fails() {
        let mut monitor = HbMonitor::new();
        assert!(monitor.unregister(&peer()).is_err());
    }
}
