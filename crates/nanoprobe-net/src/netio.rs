//! Abstract datagram transport ([`NetIO`]) and its UDP specialization
//! ([`UdpNetIO`]).
//!
//! `NetIO` is the seam between the pure wire-format/state-machine crates
//! (`nanoprobe-proto`, `nanoprobe-core`) and an actual socket: it owns the
//! "current signing/encryption frame" the original stamps onto every
//! outbound packet, and is responsible for verifying the leading signature
//! frame on everything it receives before handing decoded framesets back
//! to the caller.

use std::net::SocketAddr;

use nanoprobe_crypto::registry::KeyRegistry;
use nanoprobe_crypto::{encrypt, sign};
use nanoprobe_proto::compress;
use nanoprobe_proto::{Frame, FrameSet, NetAddr};
use tokio::net::UdpSocket;

use crate::error::NetError;

/// Abstract datagram I/O. Implemented by [`UdpNetIO`] in production and by
/// an in-memory double in tests (see `nanoprobe-harness`).
pub trait NetIO {
    /// Maximum datagram size this transport will send or accept.
    fn max_packet_size(&self) -> usize;

    /// Overrides the maximum datagram size.
    fn set_max_packet_size(&mut self, size: usize);

    /// Sends `framesets` as one coalesced datagram to `dest`, stamping the
    /// currently configured signing (and, if set, encryption) frame onto
    /// the outermost frameset. Fails with [`NetError::NoSigningFrame`] if no
    /// signing frame has been configured yet.
    fn send_framesets(
        &mut self,
        dest: &NetAddr,
        framesets: &[FrameSet],
    ) -> impl std::future::Future<Output = Result<(), NetError>> + Send;

    /// Blocks for one datagram, decodes every frameset packed into it, and
    /// returns them along with the peer address. Datagrams whose leading
    /// signature doesn't verify are dropped entirely (not even partially
    /// returned) and logged at `WARN`.
    fn recv_framesets(
        &mut self,
    ) -> impl std::future::Future<Output = Result<(Vec<FrameSet>, NetAddr), NetError>> + Send;
}

fn socket_addr_of(addr: &NetAddr) -> Result<SocketAddr, NetError> {
    match addr {
        NetAddr::V4(ip, port) => Ok(SocketAddr::new((*ip).into(), *port)),
        NetAddr::V6(ip, port) => Ok(SocketAddr::new((*ip).into(), *port)),
        other => Err(NetError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("address family of {other} has no IP/port form"),
        ))),
    }
}

/// UDP specialization of [`NetIO`]. Binds a dual-stack-capable socket (the
/// OS decides; we just ask for the address the caller gives us) in
/// non-blocking mode, matching §4.6's "UDP specialization binds ...
/// non-blocking" requirement — `tokio::net::UdpSocket` is non-blocking by
/// construction.
pub struct UdpNetIO {
    socket: UdpSocket,
    max_packet_size: usize,
    keys: KeyRegistry,
    signing_algorithm: Option<u8>,
    encrypt_to: Option<(String, u8)>,
    compression_algorithm: Option<u8>,
    recv_buf: Vec<u8>,
}

impl UdpNetIO {
    /// Binds a UDP socket to `addr` with the given key registry for signing
    /// and (optionally) encryption.
    pub async fn bind(addr: SocketAddr, keys: KeyRegistry) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpNetIO {
            socket,
            max_packet_size: nanoprobe_proto::packet::MAX_UDP_PACKET_SIZE,
            keys,
            signing_algorithm: None,
            encrypt_to: None,
            compression_algorithm: None,
            recv_buf: vec![0u8; nanoprobe_proto::packet::MAX_UDP_PACKET_SIZE],
        })
    }

    /// The local address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    /// Configures this side's signing algorithm. The signing key id itself
    /// lives in the [`KeyRegistry`] passed at construction
    /// ([`KeyRegistry::set_signing_key_id`]).
    pub fn set_signing_frame(&mut self, algorithm: u8) {
        self.signing_algorithm = Some(algorithm);
    }

    /// Configures the encryption algorithm and receiver key id used for
    /// outbound traffic. `None` (the default) sends unencrypted.
    pub fn set_encryption_frame(&mut self, algorithm: u8, receiver_key_id: impl Into<String>) {
        self.encrypt_to = Some((receiver_key_id.into(), algorithm));
    }

    /// Configures the compression algorithm applied to outbound framesets.
    /// `None` (the default) sends uncompressed.
    pub fn set_compression_frame(&mut self, algorithm: u8) {
        self.compression_algorithm = Some(algorithm);
    }

    /// The key registry backing this transport's signing/encryption.
    #[must_use]
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Mutable access to the key registry, e.g. to load keys read from the
    /// on-disk key directory at startup.
    pub fn keys_mut(&mut self) -> &mut KeyRegistry {
        &mut self.keys
    }

}

impl NetIO for UdpNetIO {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn set_max_packet_size(&mut self, size: usize) {
        self.max_packet_size = size;
    }

    async fn send_framesets(&mut self, dest: &NetAddr, framesets: &[FrameSet]) -> Result<(), NetError> {
        let addr = socket_addr_of(dest)?;
        let sender_key_id = self.keys.signing_key_id().unwrap_or("").to_string();

        // Resolve everything each closure needs into owned values up front,
        // so the closures below borrow nothing from `self` and
        // `self.socket.send_to` can still take `&mut self` afterwards.
        let signing: Option<(u8, Vec<u8>)> = match self.signing_algorithm {
            Some(algorithm) => Some((algorithm, self.keys.signing_key().map_err(NetError::Crypto)?.bytes.to_vec())),
            None => None,
        };
        let shared_encrypt_key: Option<(u8, [u8; 32])> = match &self.encrypt_to {
            Some((receiver_key_id, algorithm)) => {
                let local = self.keys.private_key(&sender_key_id).map_err(NetError::Crypto)?;
                Some((*algorithm, encrypt::derive_shared_key(&sender_key_id, receiver_key_id, &local.bytes)))
            }
            None => None,
        };
        let encrypt_to = self.encrypt_to.clone();
        let compression_algorithm = self.compression_algorithm;

        let mut packet = Vec::new();
        for fs in framesets {
            let mut fs = fs.clone();
            if let Some((algorithm, _)) = &signing {
                fs.prepend(Frame::Signature { algorithm: *algorithm, signature: Vec::new() });
            }
            if let Some((receiver_key_id, algorithm)) = &encrypt_to {
                fs.prepend(Frame::Encryption {
                    algorithm: *algorithm,
                    sender_key_id: sender_key_id.clone(),
                    receiver_key_id: receiver_key_id.clone(),
                });
            }
            if let Some(algorithm) = compression_algorithm {
                fs.prepend(Frame::Compression { algorithm, decompressed_size: 0 });
            }

            let sign_fn = |tail: &[u8]| match &signing {
                Some((algorithm, key)) => sign::sign(*algorithm, key, tail).unwrap_or_default(),
                None => Vec::new(),
            };
            let encrypt_fn = |tail: &[u8]| -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
                match &shared_encrypt_key {
                    Some((algorithm, key)) => {
                        encrypt::encrypt(*algorithm, key, 0, [0u8; encrypt::NONCE_RANDOM_SIZE], tail)
                            .map_err(|e| nanoprobe_proto::ProtocolError::CodecError(e.to_string()))
                    }
                    None => Ok(tail.to_vec()),
                }
            };
            let compress_fn = |tail: &[u8]| -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
                match compression_algorithm {
                    Some(algorithm) => Ok(compress::compress(algorithm, tail)?.0),
                    None => Ok(tail.to_vec()),
                }
            };

            let bytes = fs.construct_packet(sign_fn, encrypt_fn, compress_fn)?;
            packet.extend_from_slice(&bytes);
        }

        if packet.len() > self.max_packet_size {
            return Err(NetError::PacketTooLarge { len: packet.len(), max: self.max_packet_size });
        }

        self.socket.send_to(&packet, addr).await?;
        Ok(())
    }

    async fn recv_framesets(&mut self) -> Result<(Vec<FrameSet>, NetAddr), NetError> {
        let (len, source) = self.socket.recv_from(&mut self.recv_buf).await?;
        let packet = self.recv_buf[..len].to_vec();
        let source_addr = netaddr_from_socket(source);
        let local_key_id = self.keys.signing_key_id().unwrap_or("").to_string();

        let mut framesets = Vec::new();
        let mut cursor: &[u8] = &packet;
        while !cursor.is_empty() {
            // The encryption frame's sender_key_id isn't surfaced by
            // `parse_one`'s decrypt closure (it only hands over the tail
            // bytes), so peek it from the header ourselves to derive the
            // right shared key before decrypting.
            let shared_key = match peek_encryption_sender(cursor) {
                Some((algorithm, sender_key_id)) => match self.keys.private_key(&local_key_id) {
                    Ok(local) => {
                        Some((algorithm, encrypt::derive_shared_key(&sender_key_id, &local_key_id, &local.bytes)))
                    }
                    Err(_) => None,
                },
                None => None,
            };
            let decrypt = |tail: &[u8]| -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
                match &shared_key {
                    Some((algorithm, key)) => encrypt::decrypt(*algorithm, key, tail)
                        .map_err(|e| nanoprobe_proto::ProtocolError::CodecError(e.to_string())),
                    None => Ok(tail.to_vec()),
                }
            };
            let decompress = |tail: &[u8], declared_size: u32| -> Result<Vec<u8>, nanoprobe_proto::ProtocolError> {
                compress::decompress(compress::algorithm::ZLIB, tail, declared_size)
            };

            let (fs, signed_bytes, consumed) = match FrameSet::parse_one(cursor, decrypt, decompress) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(source = %source_addr, error = %err, "dropping malformed datagram");
                    return Ok((Vec::new(), source_addr));
                }
            };

            if let Some(Frame::Signature { algorithm, signature }) = fs.frames.first() {
                if !self.verify_signature(*algorithm, signature, &signed_bytes) {
                    tracing::warn!(source = %source_addr, "dropping datagram with bad signature");
                    return Ok((Vec::new(), source_addr));
                }
            }

            framesets.push(fs);
            cursor = &cursor[consumed..];
        }

        Ok((framesets, source_addr))
    }
}

/// Peeks the algorithm and sender key id out of a frameset's encryption
/// frame, if it has one, without fully parsing or decrypting it. Mirrors the
/// header/signature skip `FrameSet::parse_one` does internally, stopping one
/// frame earlier.
fn peek_encryption_sender(packet: &[u8]) -> Option<(u8, String)> {
    const HEADER_SIZE: usize = 7;
    let body_len = nanoprobe_proto::tlv::get_u24(packet.get(4..)?)? as usize;
    let body = packet.get(HEADER_SIZE..HEADER_SIZE + body_len)?;

    let rest = match Frame::decode(body) {
        Ok((Frame::Signature { .. }, after)) => after,
        _ => body,
    };
    match Frame::decode(rest) {
        Ok((Frame::Encryption { algorithm, sender_key_id, .. }, _)) => Some((algorithm, sender_key_id)),
        _ => None,
    }
}

impl UdpNetIO {
    /// Verifies a received signature frame against the bytes it was computed
    /// over (the tail of the frameset, exactly as `FrameSet::parse_one`
    /// captured it prior to decryption/decompression). The verification key
    /// is looked up in the local [`KeyRegistry`] by the configured verify
    /// key id ([`KeyRegistry::set_verify_key_id`]), which callers populate
    /// ahead of time (e.g. from the on-disk key directory).
    fn verify_signature(&self, algorithm: u8, signature: &[u8], signed_bytes: &[u8]) -> bool {
        match self.keys.verify_key() {
            Ok(key) => sign::verify(algorithm, key, signed_bytes, signature).is_ok(),
            Err(_) => false,
        }
    }
}

fn netaddr_from_socket(addr: SocketAddr) -> NetAddr {
    match addr {
        SocketAddr::V4(v4) => NetAddr::V4(*v4.ip(), v4.port()),
        SocketAddr::V6(v6) => NetAddr::V6(*v6.ip(), v6.port()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use nanoprobe_proto::opcodes::frameset_type;

    #[tokio::test]
    async fn bind_and_exchange_unsigned_datagram() {
        let mut a = UdpNetIO::bind("127.0.0.1:0".parse().unwrap(), KeyRegistry::new()).await.unwrap();
        let mut b = UdpNetIO::bind("127.0.0.1:0".parse().unwrap(), KeyRegistry::new()).await.unwrap();
        let b_addr = netaddr_from_socket(b.local_addr().unwrap());

        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(Frame::Int8(7));

        a.send_framesets(&b_addr, std::slice::from_ref(&fs)).await.unwrap();
        let (received, _source) = b.recv_framesets().await.unwrap();
        assert_eq!(received, vec![fs]);
    }

    #[tokio::test]
    async fn send_without_signing_key_still_works_when_unsigned() {
        let mut io = UdpNetIO::bind("127.0.0.1:0".parse().unwrap(), KeyRegistry::new()).await.unwrap();
        let addr = netaddr_from_socket(io.local_addr().unwrap());
        let fs = FrameSet::new(frameset_type::HEARTBEAT);
        assert!(io.send_framesets(&addr, &[fs]).await.is_ok());
    }
}
