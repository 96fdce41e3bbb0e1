//! Splits a raw UDP datagram into the one or more framesets packed into it.
//!
//! A single outbound packet can carry several framesets back to back (the
//! sender coalesces small framesets rather than paying a UDP header per
//! one); [`PacketDecoder`] walks the datagram frameset-by-frameset the way
//! the original's packet decoder dispatches each frame to its registered
//! constructor from one dense frametype table, except here there is only
//! one entry point ([`crate::frameset::FrameSet::parse`]) because frame
//! dispatch already happens inside it.

use crate::error::ProtocolError;
use crate::frameset::FrameSet;

/// Maximum size of a single inbound UDP datagram this implementation will
/// attempt to decode, matching the practical ceiling for an unfragmented UDP
/// packet over Ethernet-class links.
pub const MAX_UDP_PACKET_SIZE: usize = 65_507;

/// Decodes every frameset packed into one UDP datagram.
pub struct PacketDecoder;

impl PacketDecoder {
    /// Splits `packet` into its constituent framesets, decrypting each with
    /// `decrypt` and decompressing with `decompress` (each invoked once per
    /// frameset, only if that frameset carries the corresponding special
    /// frame).
    ///
    /// Decoding stops and returns an error at the first malformed frameset;
    /// any framesets fully decoded before that point are discarded along
    /// with it, since a partially-valid datagram cannot be trusted either
    /// way.
    pub fn decode_all(
        packet: &[u8],
        mut decrypt: impl FnMut(&[u8]) -> Result<Vec<u8>, ProtocolError>,
        mut decompress: impl FnMut(&[u8], u32) -> Result<Vec<u8>, ProtocolError>,
    ) -> Result<Vec<FrameSet>, ProtocolError> {
        if packet.len() > MAX_UDP_PACKET_SIZE {
            return Err(ProtocolError::TooLarge { len: packet.len(), max: MAX_UDP_PACKET_SIZE });
        }
        let mut framesets = Vec::new();
        let mut cursor = packet;
        while !cursor.is_empty() {
            let (frameset, consumed) = decode_one(cursor, &mut decrypt, &mut decompress)?;
            framesets.push(frameset);
            cursor = &cursor[consumed..];
        }
        Ok(framesets)
    }
}

/// Decodes exactly one frameset from the front of `buf`, returning it along
/// with the number of bytes it consumed.
fn decode_one(
    buf: &[u8],
    decrypt: &mut impl FnMut(&[u8]) -> Result<Vec<u8>, ProtocolError>,
    decompress: &mut impl FnMut(&[u8], u32) -> Result<Vec<u8>, ProtocolError>,
) -> Result<(FrameSet, usize), ProtocolError> {
    let (frameset, _signed_bytes, consumed) =
        FrameSet::parse_one(buf, |tail| decrypt(tail), |tail, size| decompress(tail, size))?;
    Ok((frameset, consumed))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::frame::Frame;
    use crate::opcodes::frameset_type;

    fn no_encrypt(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    fn no_compress(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    fn no_decompress(bytes: &[u8], _declared_size: u32) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    #[test]
    fn decodes_single_frameset() {
        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(Frame::Int8(1));
        let packet = fs.construct_packet(|_| Vec::new(), no_encrypt, no_compress).unwrap();

        let decoded = PacketDecoder::decode_all(&packet, no_encrypt, no_decompress).unwrap();
        assert_eq!(decoded, vec![fs]);
    }

    #[test]
    fn decodes_two_coalesced_framesets() {
        let mut fs1 = FrameSet::new(frameset_type::HEARTBEAT);
        fs1.append(Frame::Int8(1));
        let mut fs2 = FrameSet::new(frameset_type::ACK);
        fs2.append(Frame::Seqno { session_id: 1, request_id: 9, queue_id: 0 });

        let mut packet = fs1.construct_packet(|_| Vec::new(), no_encrypt, no_compress).unwrap();
        packet.extend(fs2.construct_packet(|_| Vec::new(), no_encrypt, no_compress).unwrap());

        let decoded = PacketDecoder::decode_all(&packet, no_encrypt, no_decompress).unwrap();
        assert_eq!(decoded, vec![fs1, fs2]);
    }

    #[test]
    fn oversized_packet_rejected() {
        let packet = vec![0u8; MAX_UDP_PACKET_SIZE + 1];
        assert!(matches!(
            PacketDecoder::decode_all(&packet, no_encrypt, no_decompress),
            Err(ProtocolError::TooLarge { .. })
        ));
    }
}
