//! S3-S5: the reliable-transport state machine driven over a simulated,
//! fault-injecting UDP path instead of directly in memory, so the
//! retransmit timer and the dedup/session checks run against something
//! that actually round-trips bytes through `turmoil`.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::Ipv4Addr;
use std::time::Duration;

use nanoprobe_core::{Action, FsProtoElem, FsProtoState};
use nanoprobe_harness::{host_addr, recv_framesets, send_frameset, send_with_one_shot_drops};
use nanoprobe_proto::opcodes::frameset_type;
use nanoprobe_proto::{Frame, FrameSet, NetAddr};
use turmoil::net::UdpSocket;

fn sender_addr() -> NetAddr {
    NetAddr::V4(Ipv4Addr::new(10, 0, 0, 1), 1984)
}

fn receiver_addr() -> NetAddr {
    NetAddr::V4(Ipv4Addr::new(10, 0, 0, 2), 1984)
}

fn payload() -> FrameSet {
    let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
    fs.append(Frame::Int8(42));
    fs
}

/// S3: a datagram dropped once is recovered by retransmission once the
/// connection's retransmit timer fires.
#[test]
fn dropped_datagram_is_recovered_by_retransmit() {
    let mut sim = turmoil::Builder::new().tick_duration(Duration::from_millis(10)).build();

    sim.host("receiver", || async {
        let socket = UdpSocket::bind("0.0.0.0:1984").await?;
        let mut elem = FsProtoElem::new(sender_addr(), 0, 0);

        let mut delivered = 0;
        while delivered == 0 {
            let (framesets, source) =
                recv_framesets(&socket).await.map_err(|e| std::io::Error::other(e.to_string()))?;
            for fs in framesets {
                let actions = elem
                    .handle_received(0, fs)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                for action in actions {
                    match action {
                        Action::DeliverToApp(_) => delivered += 1,
                        Action::SendFrameSet { frameset, .. } => {
                            send_frameset(&socket, source, &frameset)
                                .await
                                .map_err(|e| std::io::Error::other(e.to_string()))?;
                        }
                        Action::ConnectionClosed { .. } => {}
                    }
                }
            }
        }
        assert_eq!(delivered, 1);
        Ok(())
    });

    sim.client("sender", async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let dest = host_addr("receiver", 1984);
        let mut elem = FsProtoElem::new(receiver_addr(), 0, 7);
        elem.set_rexmit_interval_us(50_000);

        let mut drop_once = std::collections::HashSet::new();
        drop_once.insert(1);

        let mut attempts = 0;
        for action in elem.send(0, payload()).unwrap() {
            if let Action::SendFrameSet { frameset, .. } = action {
                let sent = send_with_one_shot_drops(&socket, dest, &frameset, &mut drop_once)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                attempts += usize::from(sent);
            }
        }
        assert_eq!(attempts, 0, "first transmission must be the one that gets dropped");

        let mut now = 0u64;
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            now += 10_000;
            for action in elem.tick(now) {
                if let Action::SendFrameSet { frameset, .. } = action {
                    let sent = send_with_one_shot_drops(&socket, dest, &frameset, &mut drop_once)
                        .await
                        .map_err(|e| std::io::Error::other(e.to_string()))?;
                    if sent {
                        attempts += 1;
                    }
                }
            }
            if attempts > 0 {
                break;
            }
        }
        assert_eq!(attempts, 1, "exactly one retransmit should have gotten through");

        tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut [0u8; 1500]))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    });

    sim.run().unwrap();
}

/// S4: the same datagram delivered twice over the wire is only handed to
/// the application once, and still gets acked both times.
#[test]
fn duplicate_datagram_over_the_wire_is_not_redelivered() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("receiver", || async {
        let socket = UdpSocket::bind("0.0.0.0:1984").await?;
        let mut elem = FsProtoElem::new(sender_addr(), 0, 0);

        let mut delivered = 0;
        let mut acks_sent = 0;
        for _ in 0..2 {
            let (framesets, source) =
                recv_framesets(&socket).await.map_err(|e| std::io::Error::other(e.to_string()))?;
            for fs in framesets {
                let actions = elem
                    .handle_received(0, fs)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                for action in actions {
                    match action {
                        Action::DeliverToApp(_) => delivered += 1,
                        Action::SendFrameSet { frameset, .. } => {
                            assert_eq!(frameset.fstype, frameset_type::ACK);
                            acks_sent += 1;
                            send_frameset(&socket, source, &frameset)
                                .await
                                .map_err(|e| std::io::Error::other(e.to_string()))?;
                        }
                        Action::ConnectionClosed { .. } => {}
                    }
                }
            }
        }
        assert_eq!(delivered, 1, "the duplicate must not be handed to the application twice");
        assert_eq!(acks_sent, 2, "every inbound datagram, duplicate or not, gets acked");
        Ok(())
    });

    sim.client("sender", async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let dest = host_addr("receiver", 1984);
        let mut elem = FsProtoElem::new(receiver_addr(), 0, 7);

        for action in elem.send(0, payload()).unwrap() {
            if let Action::SendFrameSet { frameset, .. } = action {
                // Send the exact same datagram twice, simulating a
                // network-level duplicate rather than an application
                // retransmit.
                send_frameset(&socket, dest, &frameset)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                send_frameset(&socket, dest, &frameset)
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
            }
        }

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut [0u8; 1500]))
                .await
                .map_err(std::io::Error::other)??;
        }
        Ok(())
    });

    sim.run().unwrap();
}

/// S5: a second datagram from the same address carrying a different
/// session id is rejected with a CONN_NAK instead of being accepted as a
/// continuation of the first session.
#[test]
fn mismatched_session_from_known_peer_is_nak_d() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("receiver", || async {
        let socket = UdpSocket::bind("0.0.0.0:1984").await?;
        let mut elem = FsProtoElem::new(sender_addr(), 0, 0);

        loop {
            let (framesets, source) =
                recv_framesets(&socket).await.map_err(|e| std::io::Error::other(e.to_string()))?;
            for fs in framesets {
                let actions = elem
                    .handle_received(0, fs)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                for action in actions {
                    if let Action::SendFrameSet { frameset, .. } = action {
                        let is_nak = frameset.fstype == frameset_type::CONN_NAK;
                        send_frameset(&socket, source, &frameset)
                            .await
                            .map_err(|e| std::io::Error::other(e.to_string()))?;
                        if is_nak {
                            assert_eq!(elem.state(), FsProtoState::None, "a session mismatch must reset local state to None");
                            return Ok(());
                        }
                    }
                }
            }
        }
    });

    sim.client("sender", async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let dest = host_addr("receiver", 1984);

        let mut first = payload();
        first.prepend(Frame::Seqno { session_id: 7, request_id: 1, queue_id: 0 });
        send_frameset(&socket, dest, &first).await.map_err(|e| std::io::Error::other(e.to_string()))?;
        // Drain the ACK for the first, legitimate datagram.
        tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut [0u8; 1500]))
            .await
            .map_err(std::io::Error::other)??;

        let mut foreign = payload();
        foreign.prepend(Frame::Seqno { session_id: 101, request_id: 1, queue_id: 0 });
        send_frameset(&socket, dest, &foreign).await.map_err(|e| std::io::Error::other(e.to_string()))?;

        tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut [0u8; 1500]))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    });

    sim.run().unwrap();
}
