//! Nanoprobe agent binary.
//!
//! # Usage
//!
//! ```bash
//! nanoprobe-agent --bind 0.0.0.0:1984 --key-dir /etc/nanoprobe/keys
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nanoprobe_agent::{
    ConfigContext, DiscoveryRunner, HandshakeAction, OsFactsCollector, PidFile, StartupHandshake,
    load_key_directory,
};
use nanoprobe_core::FsProtocol;
use nanoprobe_core::fsprotoelem::Action as TransportAction;
use nanoprobe_crypto::KeyRegistry;
use nanoprobe_heartbeat::{HbMonitor, HbSender};
use nanoprobe_net::{NetIO, UdpNetIO};
use nanoprobe_proto::NetAddr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Nanoprobe client runtime
#[derive(Parser, Debug)]
#[command(name = "nanoprobe-agent")]
#[command(about = "Client-side runtime of the nanoprobe monitoring fabric")]
#[command(version)]
struct Args {
    /// Local address to bind to
    #[arg(long, default_value = "0.0.0.0:1984")]
    bind: String,

    /// CMA address to bootstrap against; defaults to the reserved
    /// multicast bootstrap address
    #[arg(long)]
    cma: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding <key_id>.{pub,priv} files
    #[arg(long)]
    key_dir: Option<PathBuf>,

    /// Key id this agent signs outgoing framesets with
    #[arg(long)]
    signing_key_id: Option<String>,

    /// PID file path
    #[arg(long, default_value = "/var/run/nanoprobe-agent.pid")]
    pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("nanoprobe agent starting");

    let mut config = ConfigContext::new();
    if let Some(path) = &args.config {
        config = ConfigContext::load(path)?;
    }

    // Held for the process lifetime; dropping it doesn't remove the file —
    // only an explicit `release()` on graceful shutdown does, matching the
    // foreground-under-supervisor model (no daemonization, see Non-goals).
    let _pidfile = PidFile::acquire(&args.pid_file)?;
    tracing::info!(path = %args.pid_file.display(), "PID file acquired");

    let mut keys = KeyRegistry::new();
    if let Some(dir) = &args.key_dir {
        load_key_directory(dir, &mut keys)?;
        tracing::info!(dir = %dir.display(), "key directory loaded");
    }
    if let Some(key_id) = &args.signing_key_id {
        keys.set_signing_key_id(key_id.clone());
    }

    let bind_addr: SocketAddr = args.bind.parse()?;
    let mut net = UdpNetIO::bind(bind_addr, keys).await?;
    tracing::info!(addr = %net.local_addr()?, "bound UDP socket");

    let bootstrap = match &args.cma {
        Some(raw) => raw.parse::<SocketAddr>().ok().map(socketaddr_to_netaddr).unwrap_or_else(NetAddr::default_multicast),
        None => NetAddr::default_multicast(),
    };

    let mut handshake = StartupHandshake::new(bootstrap);
    let local_addr = socketaddr_to_netaddr(net.local_addr()?);
    let mut fsproto = FsProtocol::new(1);
    let mut hb_senders: Vec<HbSender> = Vec::new();
    let mut hb_monitor = HbMonitor::new();
    let mut discovery = DiscoveryRunner::new();
    discovery.add(OsFactsCollector::new(Duration::from_secs(300)));
    let mut discovery_enabled = false;

    for action in handshake.start(local_addr) {
        run_handshake_action(action, &mut net).await?;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            recv = net.recv_framesets() => {
                let (framesets, source) = match recv {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "receive failed");
                        continue;
                    }
                };
                for fs in framesets {
                    for action in handshake.handle_received(&fs) {
                        if let HandshakeAction::EnableDiscovery = &action {
                            discovery_enabled = true;
                        }
                        if let HandshakeAction::StartHeartbeating { peers } = &action {
                            for target in peers {
                                hb_senders.push(HbSender::new(target.peer.clone(), target.interval_us, now_us()));
                                let _ = hb_monitor.register(nanoprobe_heartbeat::HbListener::new(
                                    target.peer.clone(),
                                    target.deadtime_us,
                                    target.warntime_us,
                                    now_us(),
                                ));
                            }
                        }
                        run_handshake_action(action, &mut net).await?;
                    }

                    if fs.fstype == nanoprobe_proto::opcodes::frameset_type::HEARTBEAT {
                        match hb_monitor.on_heartbeat(&source, now_us()) {
                            Ok(events) => tracing::debug!(?events, peer = %source, "heartbeat"),
                            Err(martian) => tracing::warn!(peer = %martian, "martian heartbeat from unregistered peer"),
                        }
                        continue;
                    }

                    match fsproto.receive(now_us(), &source, fs) {
                        Ok(actions) => run_transport_actions(actions, &mut net).await?,
                        Err(e) => tracing::warn!(error = %e, peer = %source, "transport error"),
                    }
                }
            }
            _ = ticker.tick() => {
                let now = now_us();
                run_transport_actions(fsproto.tick(now), &mut net).await?;
                for (peer, events) in hb_monitor.scan_all(now) {
                    tracing::debug!(?events, %peer, "heartbeat scan");
                }
                for sender in &mut hb_senders {
                    if let Some(fs) = sender.tick(now) {
                        if let Err(e) = net.send_framesets(sender.dest(), std::slice::from_ref(&fs)).await {
                            tracing::warn!(error = %e, dest = %sender.dest(), "heartbeat send failed");
                        }
                    }
                }
                if discovery_enabled {
                    for fs in discovery.poll_due().await {
                        if let Err(e) = net.send_framesets(&bootstrap, std::slice::from_ref(&fs)).await {
                            tracing::warn!(error = %e, "discovery report send failed");
                        }
                    }
                }
            }
        }
    }
}

async fn run_handshake_action(action: HandshakeAction, net: &mut UdpNetIO) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        HandshakeAction::SendFrameSet { to, frameset } => {
            net.send_framesets(&to, std::slice::from_ref(&frameset)).await?;
        }
        HandshakeAction::AdoptUnicastAddress(addr) => {
            tracing::info!(%addr, "adopted unicast CMA address");
        }
        HandshakeAction::EnableDiscovery => {
            tracing::info!("discovery publication enabled");
        }
        HandshakeAction::StartHeartbeating { peers } => {
            tracing::info!(count = peers.len(), "heartbeat monitoring started");
        }
    }
    Ok(())
}

async fn run_transport_actions(actions: Vec<TransportAction>, net: &mut UdpNetIO) -> Result<(), Box<dyn std::error::Error>> {
    for action in actions {
        match action {
            TransportAction::SendFrameSet { to, frameset } => {
                net.send_framesets(&to, std::slice::from_ref(&frameset)).await?;
            }
            TransportAction::DeliverToApp(frameset) => {
                tracing::debug!(fstype = frameset.fstype, "delivered frameset to application");
            }
            TransportAction::ConnectionClosed { reason } => {
                tracing::info!(reason, "connection closed");
            }
        }
    }
    Ok(())
}

fn socketaddr_to_netaddr(addr: SocketAddr) -> NetAddr {
    match addr {
        SocketAddr::V4(v4) => NetAddr::V4(*v4.ip(), v4.port()),
        SocketAddr::V6(v6) => NetAddr::V6(*v6.ip(), v6.port()),
    }
}

fn now_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
