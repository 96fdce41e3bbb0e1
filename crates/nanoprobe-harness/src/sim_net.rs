//! Unsigned, unencrypted frameset I/O over a [`turmoil`]-simulated UDP
//! socket, plus a one-shot packet-loss filter.
//!
//! Grounded in `nanoprobe_net::netio::UdpNetIO`'s send/recv shape, stripped
//! of the signing/encryption stamping that crate does — these tests drive
//! `nanoprobe-core`'s state machine directly and only need turmoil's
//! virtual network to stand in for "an unreliable UDP path", not a second
//! exercise of the crypto layer.

use std::collections::HashSet;
use std::net::SocketAddr;

use nanoprobe_proto::{FrameSet, PacketDecoder};
use turmoil::net::UdpSocket;

use crate::error::HarnessError;

fn no_sign(_: &[u8]) -> Vec<u8> {
    Vec::new()
}

fn no_crypt(bytes: &[u8]) -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
    Ok(bytes.to_vec())
}

fn no_decompress(bytes: &[u8], _declared_size: u32) -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
    Ok(bytes.to_vec())
}

/// Encodes a frameset with no signature, encryption, or compression.
pub fn encode_frameset(fs: &FrameSet) -> Result<Vec<u8>, HarnessError> {
    Ok(fs.construct_packet(no_sign, no_crypt, no_crypt)?)
}

/// Decodes every frameset packed into a received datagram.
pub fn decode_packet(packet: &[u8]) -> Result<Vec<FrameSet>, HarnessError> {
    Ok(PacketDecoder::decode_all(packet, no_crypt, no_decompress)?)
}

/// Resolves a turmoil host name to the socket address it's reachable at on
/// `port`.
#[must_use]
pub fn host_addr(host: &str, port: u16) -> SocketAddr {
    SocketAddr::new(turmoil::lookup(host), port)
}

/// Sends one frameset, unsigned and unencrypted, to `dest`.
pub async fn send_frameset(socket: &UdpSocket, dest: SocketAddr, fs: &FrameSet) -> Result<(), HarnessError> {
    let packet = encode_frameset(fs)?;
    socket.send_to(&packet, dest).await?;
    Ok(())
}

/// Receives one datagram, decodes every frameset packed into it, and
/// returns them along with the peer address it arrived from.
pub async fn recv_framesets(socket: &UdpSocket) -> Result<(Vec<FrameSet>, SocketAddr), HarnessError> {
    let mut buf = vec![0u8; nanoprobe_proto::packet::MAX_UDP_PACKET_SIZE];
    let (len, source) = socket.recv_from(&mut buf).await?;
    Ok((decode_packet(&buf[..len])?, source))
}

/// Sends `fs` to `dest` unless its seqno frame names a sequence number in
/// `drop_once` — in which case that seqno is removed from the set (so the
/// *next* transmission of the same seqno, i.e. a retransmit, goes through)
/// and nothing is sent, simulating exactly one dropped datagram per named
/// seqno. Returns whether the datagram was actually sent.
pub async fn send_with_one_shot_drops(
    socket: &UdpSocket,
    dest: SocketAddr,
    fs: &FrameSet,
    drop_once: &mut HashSet<u64>,
) -> Result<bool, HarnessError> {
    if let Some((_, _, seqno)) = fs.seqno() {
        if drop_once.remove(&seqno) {
            return Ok(false);
        }
    }
    send_frameset(socket, dest, fs).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use nanoprobe_proto::Frame;
    use nanoprobe_proto::opcodes::frameset_type;

    #[test]
    fn echo_over_simulated_udp() {
        let mut sim = turmoil::Builder::new().build();

        sim.host("receiver", || async {
            let socket = UdpSocket::bind("0.0.0.0:1984").await?;
            let (framesets, _source) =
                recv_framesets(&socket).await.map_err(|e| std::io::Error::other(e.to_string()))?;
            assert_eq!(framesets.len(), 1);
            assert_eq!(framesets[0].fstype, frameset_type::HEARTBEAT);
            Ok(())
        });

        sim.client("sender", async {
            let socket = UdpSocket::bind("0.0.0.0:0").await?;
            let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
            fs.append(Frame::Int8(7));
            send_frameset(&socket, host_addr("receiver", 1984), &fs)
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(())
        });

        sim.run().unwrap();
    }
}
