//! Startup handshake (spec.md §6, SPEC_FULL §4.11): the agent's top-level
//! driver state machine.
//!
//! `Bootstrapping` (send STARTUP to the multicast bootstrap address) →
//! `AwaitingConfig` (on SETCONFIG, adopt the unicast CMA address, enable
//! discovery publication) → `Monitoring` (on the first SENDEXPECTHB, start
//! heartbeat sending/listening for the addresses it names).
//!
//! Pure state machine in the same "actions in, actions out" shape as
//! [`nanoprobe_core::fsprotoelem::FsProtoElem`]: no socket, no clock, no I/O.

use nanoprobe_proto::opcodes::frameset_type;
use nanoprobe_proto::{Frame, FrameSet, NetAddr};

/// Handshake lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Announcing on the bootstrap multicast address, awaiting SETCONFIG.
    Bootstrapping,
    /// Unicast address adopted; discovery publication enabled; awaiting the
    /// first SENDEXPECTHB to learn which peers to heartbeat.
    AwaitingConfig,
    /// Heartbeat sending/listening active for the configured peers.
    Monitoring,
}

/// A side effect the driver must carry out in response to a handshake
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send `frameset` to `to`.
    SendFrameSet {
        /// Destination address.
        to: NetAddr,
        /// Frameset to transmit.
        frameset: FrameSet,
    },
    /// Adopt this unicast address as the local endpoint from now on.
    AdoptUnicastAddress(NetAddr),
    /// Enable periodic discovery-report publication.
    EnableDiscovery,
    /// Begin heartbeat send/listen for this set of peers, each with its own
    /// interval/deadtime/warntime (all in microseconds).
    StartHeartbeating {
        /// Peers to heartbeat, with their configured timing.
        peers: Vec<HeartbeatTarget>,
    },
}

/// One peer's heartbeat configuration, as carried by a SENDEXPECTHB
/// frameset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatTarget {
    /// Peer to heartbeat.
    pub peer: NetAddr,
    /// Heartbeat send interval, in microseconds.
    pub interval_us: u64,
    /// Deadtime (missed-heartbeat) timeout, in microseconds.
    pub deadtime_us: u64,
    /// Warntime (early-warning) timeout, in microseconds.
    pub warntime_us: u64,
}

/// Drives the startup handshake. Holds no socket; every transition returns
/// the [`HandshakeAction`]s the caller must perform.
#[derive(Debug)]
pub struct StartupHandshake {
    state: HandshakeState,
    bootstrap_addr: NetAddr,
}

impl StartupHandshake {
    /// Creates a handshake driver targeting the given bootstrap multicast
    /// address (typically [`NetAddr::default_multicast`]).
    #[must_use]
    pub fn new(bootstrap_addr: NetAddr) -> Self {
        StartupHandshake { state: HandshakeState::Bootstrapping, bootstrap_addr }
    }

    /// Current handshake state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Begins bootstrapping: emits STARTUP to the multicast address. Called
    /// once local address discovery has completed, per spec.md §6.
    pub fn start(&mut self, local_addr: NetAddr) -> Vec<HandshakeAction> {
        let mut fs = FrameSet::new(frameset_type::STARTUP);
        fs.append(Frame::Address(local_addr));
        vec![HandshakeAction::SendFrameSet { to: self.bootstrap_addr.clone(), frameset: fs }]
    }

    /// Processes a received frameset, dispatching on its type. Framesets
    /// that aren't part of the handshake (anything but SETCONFIG while
    /// bootstrapping, or SENDEXPECTHB while awaiting config) are ignored —
    /// the caller is expected to route those to other listeners instead.
    pub fn handle_received(&mut self, frameset: &FrameSet) -> Vec<HandshakeAction> {
        match (self.state, frameset.fstype) {
            (HandshakeState::Bootstrapping, t) if t == frameset_type::SETCONFIG => self.handle_setconfig(frameset),
            (HandshakeState::AwaitingConfig, t) if t == frameset_type::SENDEXPECTHB => {
                self.handle_sendexpecthb(frameset)
            }
            _ => Vec::new(),
        }
    }

    fn handle_setconfig(&mut self, frameset: &FrameSet) -> Vec<HandshakeAction> {
        let Some(unicast) = frameset.frames.iter().find_map(|f| match f {
            Frame::Address(addr) => Some(addr.clone()),
            _ => None,
        }) else {
            return Vec::new();
        };
        self.state = HandshakeState::AwaitingConfig;
        vec![HandshakeAction::AdoptUnicastAddress(unicast), HandshakeAction::EnableDiscovery]
    }

    fn handle_sendexpecthb(&mut self, frameset: &FrameSet) -> Vec<HandshakeAction> {
        let peers = parse_heartbeat_targets(frameset);
        if peers.is_empty() {
            return Vec::new();
        }
        self.state = HandshakeState::Monitoring;
        vec![HandshakeAction::StartHeartbeating { peers }]
    }
}

/// Parses a SENDEXPECTHB frameset's repeated `(address, interval, deadtime,
/// warntime)` groups. Each group is carried as four consecutive frames:
/// address, then three `Int8` microsecond values in that order.
fn parse_heartbeat_targets(frameset: &FrameSet) -> Vec<HeartbeatTarget> {
    let mut targets = Vec::new();
    let mut frames = frameset.frames.iter();
    while let Some(frame) = frames.next() {
        let Frame::Address(peer) = frame else { continue };
        let Some(Frame::Int8(interval_us)) = frames.next() else { break };
        let Some(Frame::Int8(deadtime_us)) = frames.next() else { break };
        let Some(Frame::Int8(warntime_us)) = frames.next() else { break };
        targets.push(HeartbeatTarget {
            peer: peer.clone(),
            interval_us: *interval_us,
            deadtime_us: *deadtime_us,
            warntime_us: *warntime_us,
        });
    }
    targets
}
