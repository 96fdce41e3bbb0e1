//! [`FrameSet`]: an ordered collection of [`Frame`]s that forms one unit of
//! transmission.
//!
//! A small number of "special" frames, if present, must appear first and in
//! a fixed order — signature, then encryption, then compression — because
//! each one's meaning depends on the bytes that follow it in the
//! constructed packet: the signature covers everything after it, the
//! encryption frame says how to decrypt everything after it, and the
//! compression frame says how to decompress everything after it. Grounded
//! in the original's `frameset_construct_packet`, which takes the special
//! frames as separate arguments precisely so it can enforce this ordering
//! rather than trusting caller-supplied frame order.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::opcodes::END_OF_FRAMESET_TYPE;
use crate::tlv;

/// An ordered set of frames sharing one frameset type and flags word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    /// Frameset type, e.g. [`crate::opcodes::frameset_type::HEARTBEAT`].
    pub fstype: u16,
    /// Frameset-level flags (currently just a bitfield the peer echoes back
    /// uninterpreted; no flag bits are assigned meaning here).
    pub fsflags: u16,
    /// Frames in wire order, with special frames (if any) already sorted to
    /// the front by [`FrameSet::construct_packet`].
    pub frames: Vec<Frame>,
}

impl FrameSet {
    /// Creates an empty frameset of the given type.
    #[must_use]
    pub fn new(fstype: u16) -> Self {
        FrameSet { fstype, fsflags: 0, frames: Vec::new() }
    }

    /// Appends a frame to the end of the frameset.
    pub fn append(&mut self, frame: Frame) -> &mut Self {
        self.frames.push(frame);
        self
    }

    /// Prepends a frame to the front of the frameset.
    pub fn prepend(&mut self, frame: Frame) -> &mut Self {
        self.frames.insert(0, frame);
        self
    }

    /// Returns the frameset's sequence-number frame, if it carries one, as
    /// `(session_id, queue_id, request_id)`.
    #[must_use]
    pub fn seqno(&self) -> Option<(u32, u16, u64)> {
        self.frames.iter().find_map(|f| match f {
            Frame::Seqno { session_id, request_id, queue_id } => Some((*session_id, *queue_id, *request_id)),
            _ => None,
        })
    }

    /// Returns `(tail_start, sig_present, crypt_present, compress_present)`
    /// once [`FrameSet::validate_special_order`] has confirmed the special
    /// frames (if any) occupy a well-ordered prefix.
    fn special_frame_layout(&self) -> (usize, bool, bool, bool) {
        let sig_present = matches!(self.frames.first(), Some(Frame::Signature { .. }));
        let crypt_index = usize::from(sig_present);
        let crypt_present = matches!(self.frames.get(crypt_index), Some(Frame::Encryption { .. }));
        let compress_index = crypt_index + usize::from(crypt_present);
        let compress_present = matches!(self.frames.get(compress_index), Some(Frame::Compression { .. }));
        let tail_start = compress_index + usize::from(compress_present);
        (tail_start, sig_present, crypt_present, compress_present)
    }

    /// Validates that any signature/encryption/compression frames present
    /// appear at the front, in that order, with no duplicates.
    fn validate_special_order(&self) -> Result<(), ProtocolError> {
        use crate::opcodes::frame_type;
        let mut expect_from = 0usize;
        let mut seen_sig = false;
        let mut seen_crypt = false;
        let mut seen_compress = false;
        for (i, frame) in self.frames.iter().enumerate() {
            match frame {
                Frame::Signature { .. } => {
                    if i != expect_from || seen_sig || seen_crypt || seen_compress {
                        return Err(ProtocolError::BadSpecialFrameOrder);
                    }
                    seen_sig = true;
                    expect_from += 1;
                }
                Frame::Encryption { .. } => {
                    if i != expect_from || seen_crypt || seen_compress {
                        return Err(ProtocolError::BadSpecialFrameOrder);
                    }
                    seen_crypt = true;
                    expect_from += 1;
                }
                Frame::Compression { .. } => {
                    if i != expect_from || seen_compress {
                        return Err(ProtocolError::BadSpecialFrameOrder);
                    }
                    seen_compress = true;
                    expect_from += 1;
                }
                _ => {
                    // A non-special frame type appearing where we still
                    // expect special frames is fine — it just means none
                    // of the later special kinds are present.
                    if matches!(frame.frame_type(), t if t == frame_type::SIGNATURE || t == frame_type::ENCRYPTION || t == frame_type::COMPRESSION)
                    {
                        return Err(ProtocolError::BadSpecialFrameOrder);
                    }
                }
            }
        }
        Ok(())
    }

    /// Assembles the on-wire packet for this frameset: frameset type,
    /// flags, each frame's TLV encoding in order, then the end-of-frameset
    /// sentinel.
    ///
    /// Layering is applied inner-to-outer: the payload (everything after the
    /// special frames) plus the sentinel is compressed first via
    /// `compress`, then the result is encrypted via `encrypt`, then (if a
    /// signature frame is present) the final ciphertext is signed via
    /// `sign` and the signature is patched into a copy of the signature
    /// frame — a two-pass write, since the signature frame is serialized
    /// first but computed last. Each closure receives exactly the bytes it
    /// is responsible for transforming.
    pub fn construct_packet(
        &self,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
        encrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>, ProtocolError>,
        compress: impl FnOnce(&[u8]) -> Result<Vec<u8>, ProtocolError>,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.validate_special_order()?;
        let (tail_start, sig_present, crypt_present, compress_present) = self.special_frame_layout();

        let mut payload = Vec::new();
        for frame in &self.frames[tail_start..] {
            frame.encode(&mut payload)?;
        }
        payload.extend_from_slice(&END_OF_FRAMESET_TYPE.to_be_bytes());
        payload.extend_from_slice(&[0, 0, 0]);

        let uncompressed_len = payload.len() as u32;
        let payload = if compress_present { compress(&payload)? } else { payload };
        let payload = if crypt_present { encrypt(&payload)? } else { payload };

        let mut body = Vec::new();
        if sig_present {
            let signature = sign(&payload);
            let mut sig_frame = self.frames[0].clone();
            if let Frame::Signature { signature: slot, .. } = &mut sig_frame {
                *slot = signature;
            }
            sig_frame.encode(&mut body)?;
        }
        if crypt_present {
            self.frames[usize::from(sig_present)].encode(&mut body)?;
        }
        if compress_present {
            let compress_index = usize::from(sig_present) + usize::from(crypt_present);
            // Stamp the true pre-compression length, computed just above,
            // rather than trusting whatever the caller put in the frame —
            // the declared size doubles as the decompression-bomb bound, so
            // it must reflect reality.
            let mut compress_frame = self.frames[compress_index].clone();
            if let Frame::Compression { decompressed_size, .. } = &mut compress_frame {
                *decompressed_size = uncompressed_len;
            }
            compress_frame.encode(&mut body)?;
        }
        body.extend_from_slice(&payload);

        if body.len() > u32::from(u16::MAX) as usize * 256 {
            return Err(ProtocolError::TooLarge { len: body.len(), max: (1 << 24) - 1 });
        }

        let mut out = Vec::new();
        out.extend_from_slice(&self.fstype.to_be_bytes());
        out.extend_from_slice(&self.fsflags.to_be_bytes());
        let mut len_buf = [0u8; 3];
        tlv::set_u24(&mut len_buf, body.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parses a frameset back out of `packet`, reversing
    /// [`FrameSet::construct_packet`]; discards the raw signed bytes
    /// [`FrameSet::parse_verifiable`] exposes, for callers that don't need
    /// to check a signature (e.g. unsigned framesets, tests).
    pub fn parse(
        packet: &[u8],
        decrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>, ProtocolError>,
        decompress: impl FnOnce(&[u8], u32) -> Result<Vec<u8>, ProtocolError>,
    ) -> Result<FrameSet, ProtocolError> {
        Ok(Self::parse_verifiable(packet, decrypt, decompress)?.0)
    }

    /// Parses a frameset, also returning the exact bytes that followed the
    /// signature frame before decryption — the bytes a correct `sign` call
    /// in [`FrameSet::construct_packet`] computed the signature over.
    /// Callers that need to authenticate the sender pass these to
    /// [`crate`]-external signature verification alongside the returned
    /// signature frame.
    pub fn parse_verifiable(
        packet: &[u8],
        decrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>, ProtocolError>,
        decompress: impl FnOnce(&[u8], u32) -> Result<Vec<u8>, ProtocolError>,
    ) -> Result<(FrameSet, Vec<u8>), ProtocolError> {
        Self::parse_one(packet, decrypt, decompress).map(|(fs, signed, _consumed)| (fs, signed))
    }

    /// Parses exactly one frameset from the front of `packet` (which may
    /// hold several coalesced back to back), returning the frameset, the
    /// raw pre-decrypt bytes the signature covers, and the number of bytes
    /// of `packet` this frameset consumed (header + `body_len`) so a caller
    /// can resume at the next frameset.
    pub fn parse_one(
        packet: &[u8],
        decrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>, ProtocolError>,
        decompress: impl FnOnce(&[u8], u32) -> Result<Vec<u8>, ProtocolError>,
    ) -> Result<(FrameSet, Vec<u8>, usize), ProtocolError> {
        const HEADER_SIZE: usize = 7; // type:u16 + flags:u16 + body_len:u24

        let fstype = tlv::get_u16(packet).ok_or(ProtocolError::Truncated {
            claimed: 2,
            available: packet.len(),
        })?;
        let fsflags = tlv::get_u16(&packet[2..]).ok_or(ProtocolError::Truncated {
            claimed: 2,
            available: packet.len().saturating_sub(2),
        })?;
        let body_len = tlv::get_u24(&packet[4..]).ok_or(ProtocolError::Truncated {
            claimed: 3,
            available: packet.len().saturating_sub(4),
        })? as usize;
        let body = packet.get(HEADER_SIZE..HEADER_SIZE + body_len).ok_or(ProtocolError::Truncated {
            claimed: body_len,
            available: packet.len().saturating_sub(HEADER_SIZE),
        })?;
        let consumed = HEADER_SIZE + body_len;
        let mut rest = body;

        let mut frames = Vec::new();

        let (sig_frame, after_sig) = match Frame::decode(rest) {
            Ok((frame @ Frame::Signature { .. }, after)) => (Some(frame), after),
            _ => (None, rest),
        };
        rest = after_sig;

        let (crypt_frame, after_crypt) = match Frame::decode(rest) {
            Ok((frame @ Frame::Encryption { .. }, after)) => (Some(frame), after),
            _ => (None, rest),
        };
        rest = after_crypt;

        let (compress_frame, after_compress) = match Frame::decode(rest) {
            Ok((frame @ Frame::Compression { .. }, after)) => (Some(frame), after),
            _ => (None, rest),
        };
        rest = after_compress;

        let signed_bytes = rest.to_vec();

        let decrypted = if crypt_frame.is_some() { decrypt(rest)? } else { rest.to_vec() };
        let decompressed = match &compress_frame {
            Some(Frame::Compression { decompressed_size, .. }) => decompress(&decrypted, *decompressed_size)?,
            _ => decrypted,
        };
        let mut tail_rest: &[u8] = &decompressed;

        if let Some(frame) = sig_frame {
            frames.push(frame);
        }
        if let Some(frame) = crypt_frame {
            frames.push(frame);
        }
        if let Some(frame) = compress_frame {
            frames.push(frame);
        }

        loop {
            let header = tlv::tlv_header(tail_rest).ok_or(ProtocolError::MissingSentinel)?;
            if header.tlv_type == END_OF_FRAMESET_TYPE && header.tlv_len == 0 {
                break;
            }
            let (frame, next) = Frame::decode(tail_rest)?;
            frames.push(frame);
            tail_rest = next;
        }

        Ok((FrameSet { fstype, fsflags, frames }, signed_bytes, consumed))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::opcodes::frameset_type;

    fn no_sign(_: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn no_encrypt(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    fn no_decrypt(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    fn no_compress(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    fn no_decompress(bytes: &[u8], _declared_size: u32) -> Result<Vec<u8>, ProtocolError> {
        Ok(bytes.to_vec())
    }

    #[test]
    fn plain_frameset_round_trips() {
        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(Frame::NvPair("nodename".into(), "host1".into()));
        fs.append(Frame::Int8(42));

        let packet = fs.construct_packet(no_sign, no_encrypt, no_compress).unwrap();
        let parsed = FrameSet::parse(&packet, no_decrypt, no_decompress).unwrap();
        assert_eq!(parsed, fs);
    }

    #[test]
    fn signature_is_computed_over_trailing_bytes() {
        let mut fs = FrameSet::new(frameset_type::ACK);
        fs.append(Frame::Signature { algorithm: 1, signature: Vec::new() });
        fs.append(Frame::Seqno { session_id: 1, request_id: 5, queue_id: 0 });

        let packet = fs
            .construct_packet(|tail| vec![tail.len() as u8], no_encrypt, no_compress)
            .unwrap();
        let parsed = FrameSet::parse(&packet, no_decrypt, no_decompress).unwrap();
        match &parsed.frames[0] {
            Frame::Signature { signature, .. } => assert_eq!(signature.len(), 1),
            other => panic!("expected signature frame, got {other:?}"),
        }
    }

    #[test]
    fn encryption_transforms_tail() {
        let mut fs = FrameSet::new(frameset_type::DISCOVERY);
        fs.append(Frame::Encryption {
            algorithm: 1,
            sender_key_id: "a".into(),
            receiver_key_id: "b".into(),
        });
        fs.append(Frame::Cstring("secret".into()));

        // A trivial XOR "cipher" so the test can prove transform+inverse run.
        let xor = |bytes: &[u8]| bytes.iter().map(|b| b ^ 0xFF).collect::<Vec<u8>>();

        let packet = fs
            .construct_packet(no_sign, |tail| Ok(xor(tail)), no_compress)
            .unwrap();
        let parsed = FrameSet::parse(&packet, |tail| Ok(xor(tail)), no_decompress).unwrap();
        assert_eq!(parsed, fs);
    }

    #[test]
    fn compression_transforms_tail() {
        use crate::compress;

        let mut fs = FrameSet::new(frameset_type::DISCOVERY);
        fs.append(Frame::Compression { algorithm: compress::algorithm::ZLIB, decompressed_size: 0 });
        fs.append(Frame::Cstring("x".repeat(256)));

        let packet = fs
            .construct_packet(no_sign, no_encrypt, |bytes| {
                let (compressed, _len) = compress::compress(compress::algorithm::ZLIB, bytes)?;
                Ok(compressed)
            })
            .unwrap();
        let parsed = FrameSet::parse(&packet, no_decrypt, |bytes, declared_size| {
            compress::decompress(compress::algorithm::ZLIB, bytes, declared_size)
        })
        .unwrap();

        match &parsed.frames[1] {
            Frame::Cstring(s) => assert_eq!(s, &"x".repeat(256)),
            other => panic!("expected cstring payload frame, got {other:?}"),
        }
    }

    #[test]
    fn out_of_order_special_frames_rejected() {
        let mut fs = FrameSet::new(frameset_type::HEARTBEAT);
        fs.append(Frame::Encryption {
            algorithm: 1,
            sender_key_id: "a".into(),
            receiver_key_id: "b".into(),
        });
        fs.append(Frame::Signature { algorithm: 1, signature: vec![] });

        assert_eq!(
            fs.construct_packet(no_sign, no_encrypt, no_compress),
            Err(ProtocolError::BadSpecialFrameOrder)
        );
    }

    #[test]
    fn missing_sentinel_is_detected() {
        let mut packet = Vec::new();
        packet.extend_from_slice(&frameset_type::HEARTBEAT.to_be_bytes());
        packet.extend_from_slice(&0u16.to_be_bytes());
        packet.extend_from_slice(&[0, 0, 0]); // body_len = 0, no sentinel inside
        assert_eq!(
            FrameSet::parse(&packet, no_decrypt, no_decompress),
            Err(ProtocolError::MissingSentinel)
        );
    }

    #[test]
    fn seqno_accessor_finds_seqno_frame() {
        let mut fs = FrameSet::new(frameset_type::ACK);
        fs.append(Frame::Seqno { session_id: 7, request_id: 3, queue_id: 1 });
        assert_eq!(fs.seqno(), Some((7, 1, 3)));
    }
}
