//! Individual frame variants: the leaves of a [`crate::frameset::FrameSet`].
//!
//! Every variant round-trips through the same shape: a 5-byte generic TLV
//! header (type + 24-bit length) followed by exactly that many value bytes.
//! What differs between variants is how the value bytes are interpreted and
//! validated. Grounded in the original's per-frame-type constructors
//! (`frame_tlvconstructor` family) registered in a dense frametype table,
//! rebuilt here as one closed Rust `enum` instead of a C vtable-per-type.

use crate::error::ProtocolError;
use crate::netaddr::NetAddr;
use crate::opcodes::frame_type;
use crate::tlv;

/// Maximum value length for any single frame: generous enough for a
/// discovery payload, small enough that no single frame can exhaust a UDP
/// packet's worth of memory many times over.
pub const MAX_FRAME_VALUE_LEN: usize = 1 << 20; // 1 MiB

/// A single decoded frame, with its type tag kept alongside its payload so
/// unknown-but-well-formed frames can still be relayed without understanding
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// A NUL-terminated string, stored without the trailing NUL.
    Cstring(String),
    /// A name/value pair, each stored without trailing NULs.
    NvPair(String, String),
    /// 1-byte unsigned integer.
    Int1(u8),
    /// 2-byte unsigned integer.
    Int2(u16),
    /// 3-byte unsigned integer (stored widened; top byte always zero).
    Int3(u32),
    /// 4-byte unsigned integer.
    Int4(u32),
    /// 8-byte unsigned integer.
    Int8(u64),
    /// A network address.
    Address(NetAddr),
    /// A network address with an explicit companion port field (used where
    /// the address's own port, if any, means something different).
    IpPort(NetAddr, u16),
    /// A reliable-transport sequence number: session id, request id, queue id.
    Seqno {
        /// Session identifier, changes each time a connection is re-established.
        session_id: u32,
        /// Monotonic sequence number within `(session_id, queue_id)`.
        request_id: u64,
        /// Which logical queue (stream) this sequence number belongs to.
        queue_id: u16,
    },
    /// Digital signature algorithm selector plus signature bytes.
    Signature {
        /// `0 = CRC32`, `1 = SHA-256 HMAC`, `2 = Ed25519`.
        algorithm: u8,
        /// Signature bytes; empty until [`crate::frameset::FrameSet::construct_packet`]
        /// computes them over the remainder of the packet.
        signature: Vec<u8>,
    },
    /// Encryption algorithm selector plus sender/receiver key ids.
    Encryption {
        /// `0 = none`, `1 = XChaCha20-Poly1305`.
        algorithm: u8,
        /// Key id of the sender's identity.
        sender_key_id: String,
        /// Key id of the intended receiver's identity.
        receiver_key_id: String,
    },
    /// Compression algorithm selector plus the decompressed size, used to
    /// pre-size the output buffer and cap decompression blowup.
    Compression {
        /// `0 = none`, `1 = zlib`.
        algorithm: u8,
        /// Size of the data once decompressed.
        decompressed_size: u32,
    },
    /// A frame type this implementation doesn't assign meaning to, kept
    /// as-is so it can still be counted, relayed, or logged.
    Unknown {
        /// The frame's on-wire type code.
        frame_type: u16,
        /// Raw value bytes.
        value: Vec<u8>,
    },
}

impl Frame {
    /// The on-wire frame-type code for this frame.
    #[must_use]
    pub fn frame_type(&self) -> u16 {
        match self {
            Frame::Binary(_) => frame_type::BINARY,
            Frame::Cstring(_) => frame_type::CSTRING,
            Frame::NvPair(..) => frame_type::NVPAIR,
            Frame::Int1(_) => frame_type::INT1,
            Frame::Int2(_) => frame_type::INT2,
            Frame::Int3(_) => frame_type::INT3,
            Frame::Int4(_) => frame_type::INT4,
            Frame::Int8(_) => frame_type::INT8,
            Frame::Address(_) => frame_type::ADDRESS,
            Frame::IpPort(..) => frame_type::IP_PORT,
            Frame::Seqno { .. } => frame_type::SEQNO,
            Frame::Signature { .. } => frame_type::SIGNATURE,
            Frame::Encryption { .. } => frame_type::ENCRYPTION,
            Frame::Compression { .. } => frame_type::COMPRESSION,
            Frame::Unknown { frame_type, .. } => *frame_type,
        }
    }

    /// Encodes this frame's value bytes (not including the TLV header) into
    /// `out`.
    fn encode_value(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            Frame::Binary(bytes) => out.extend_from_slice(bytes),
            Frame::Cstring(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            Frame::NvPair(name, value) => {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
                out.extend_from_slice(value.as_bytes());
                out.push(0);
            }
            Frame::Int1(v) => out.push(*v),
            Frame::Int2(v) => out.extend_from_slice(&v.to_be_bytes()),
            Frame::Int3(v) => {
                let mut buf = [0u8; 3];
                tlv::set_u24(&mut buf, *v);
                out.extend_from_slice(&buf);
            }
            Frame::Int4(v) => out.extend_from_slice(&v.to_be_bytes()),
            Frame::Int8(v) => out.extend_from_slice(&v.to_be_bytes()),
            Frame::Address(addr) => encode_netaddr(addr, out),
            Frame::IpPort(addr, port) => {
                encode_netaddr(addr, out);
                out.extend_from_slice(&port.to_be_bytes());
            }
            Frame::Seqno { session_id, request_id, queue_id } => {
                out.extend_from_slice(&session_id.to_be_bytes());
                out.extend_from_slice(&request_id.to_be_bytes());
                out.extend_from_slice(&queue_id.to_be_bytes());
            }
            Frame::Signature { algorithm, signature } => {
                out.push(*algorithm);
                out.extend_from_slice(signature);
            }
            Frame::Encryption { algorithm, sender_key_id, receiver_key_id } => {
                if sender_key_id.len() > 255 || receiver_key_id.len() > 255 {
                    return Err(ProtocolError::TooLarge {
                        len: sender_key_id.len().max(receiver_key_id.len()),
                        max: 255,
                    });
                }
                out.push(*algorithm);
                out.push(sender_key_id.len() as u8);
                out.extend_from_slice(sender_key_id.as_bytes());
                out.push(receiver_key_id.len() as u8);
                out.extend_from_slice(receiver_key_id.as_bytes());
            }
            Frame::Compression { algorithm, decompressed_size } => {
                out.push(*algorithm);
                out.extend_from_slice(&decompressed_size.to_be_bytes());
            }
            Frame::Unknown { value, .. } => out.extend_from_slice(value),
        }
        Ok(())
    }

    /// Encodes this frame (header + value) and appends it to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let mut value = Vec::new();
        self.encode_value(&mut value)?;
        if value.len() > MAX_FRAME_VALUE_LEN {
            return Err(ProtocolError::TooLarge { len: value.len(), max: MAX_FRAME_VALUE_LEN });
        }
        out.extend_from_slice(&self.frame_type().to_be_bytes());
        let mut len_buf = [0u8; 3];
        tlv::set_u24(&mut len_buf, value.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&value);
        Ok(())
    }

    /// Decodes one frame (header + value) from the front of `buf`, returning
    /// the frame and the remaining unconsumed bytes.
    pub fn decode(buf: &[u8]) -> Result<(Frame, &[u8]), ProtocolError> {
        let header = tlv::tlv_header(buf).ok_or(ProtocolError::Truncated {
            claimed: buf.len(),
            available: buf.len(),
        })?;
        let total = tlv::tlv_total_size(header.tlv_len);
        if buf.len() < total {
            return Err(ProtocolError::Truncated { claimed: total, available: buf.len() });
        }
        if header.tlv_len as usize > MAX_FRAME_VALUE_LEN {
            return Err(ProtocolError::TooLarge {
                len: header.tlv_len as usize,
                max: MAX_FRAME_VALUE_LEN,
            });
        }
        let value = &buf[tlv::TLV_HEADER_SIZE..total];
        let frame = decode_value(header.tlv_type, value)?;
        Ok((frame, &buf[total..]))
    }
}

// Every `expect("width checked")` below follows an `expect_width` call that
// already proved `value` is exactly the width the `tlv::get_*` accessor
// requires, so the accessor's `None` branch is unreachable here.
#[allow(clippy::expect_used)]
fn decode_value(frame_type: u16, value: &[u8]) -> Result<Frame, ProtocolError> {
    match frame_type {
        t if t == crate::opcodes::frame_type::BINARY => Ok(Frame::Binary(value.to_vec())),
        t if t == crate::opcodes::frame_type::CSTRING => Ok(Frame::Cstring(decode_cstring(value)?)),
        t if t == crate::opcodes::frame_type::NVPAIR => decode_nvpair(value),
        t if t == crate::opcodes::frame_type::INT1 => {
            expect_width(value, 1)?;
            Ok(Frame::Int1(value[0]))
        }
        t if t == crate::opcodes::frame_type::INT2 => {
            expect_width(value, 2)?;
            Ok(Frame::Int2(tlv::get_u16(value).expect("width checked")))
        }
        t if t == crate::opcodes::frame_type::INT3 => {
            expect_width(value, 3)?;
            Ok(Frame::Int3(tlv::get_u24(value).expect("width checked")))
        }
        t if t == crate::opcodes::frame_type::INT4 => {
            expect_width(value, 4)?;
            Ok(Frame::Int4(tlv::get_u32(value).expect("width checked")))
        }
        t if t == crate::opcodes::frame_type::INT8 => {
            expect_width(value, 8)?;
            Ok(Frame::Int8(tlv::get_u64(value).expect("width checked")))
        }
        t if t == crate::opcodes::frame_type::ADDRESS => {
            let (addr, rest) = decode_netaddr(value)?;
            if !rest.is_empty() {
                return Err(ProtocolError::MalformedAddress);
            }
            Ok(Frame::Address(addr))
        }
        t if t == crate::opcodes::frame_type::IP_PORT => {
            let (addr, rest) = decode_netaddr(value)?;
            let port = tlv::get_u16(rest).ok_or(ProtocolError::MalformedAddress)?;
            Ok(Frame::IpPort(addr, port))
        }
        t if t == crate::opcodes::frame_type::SEQNO => {
            expect_width(value, 14)?;
            let session_id = tlv::get_u32(value).ok_or(ProtocolError::MalformedSeqno {
                expected: 14,
                actual: value.len(),
            })?;
            let request_id = tlv::get_u64(&value[4..]).ok_or(ProtocolError::MalformedSeqno {
                expected: 14,
                actual: value.len(),
            })?;
            let queue_id = tlv::get_u16(&value[12..]).ok_or(ProtocolError::MalformedSeqno {
                expected: 14,
                actual: value.len(),
            })?;
            Ok(Frame::Seqno { session_id, request_id, queue_id })
        }
        t if t == crate::opcodes::frame_type::SIGNATURE => {
            let algorithm = *value.first().ok_or(ProtocolError::Truncated {
                claimed: 1,
                available: 0,
            })?;
            Ok(Frame::Signature { algorithm, signature: value[1..].to_vec() })
        }
        t if t == crate::opcodes::frame_type::ENCRYPTION => decode_encryption(value),
        t if t == crate::opcodes::frame_type::COMPRESSION => {
            expect_width(value, 5)?;
            let algorithm = value[0];
            let decompressed_size = tlv::get_u32(&value[1..]).expect("width checked");
            Ok(Frame::Compression { algorithm, decompressed_size })
        }
        other => Ok(Frame::Unknown { frame_type: other, value: value.to_vec() }),
    }
}

fn expect_width(value: &[u8], width: usize) -> Result<(), ProtocolError> {
    if value.len() == width {
        Ok(())
    } else {
        Err(ProtocolError::WrongIntegerWidth { expected: width, actual: value.len() })
    }
}

fn decode_cstring(value: &[u8]) -> Result<String, ProtocolError> {
    let (body, rest) = split_nul(value).ok_or(ProtocolError::MissingNulTerminator)?;
    if !rest.is_empty() {
        return Err(ProtocolError::MissingNulTerminator);
    }
    String::from_utf8(body.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

fn decode_nvpair(value: &[u8]) -> Result<Frame, ProtocolError> {
    let (name, rest) = split_nul(value).ok_or(ProtocolError::MissingNulTerminator)?;
    let (val, rest) = split_nul(rest).ok_or(ProtocolError::MissingNulTerminator)?;
    if !rest.is_empty() {
        return Err(ProtocolError::MissingNulTerminator);
    }
    let name = String::from_utf8(name.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
    let val = String::from_utf8(val.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(Frame::NvPair(name, val))
}

fn split_nul(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = buf.iter().position(|&b| b == 0)?;
    Some((&buf[..pos], &buf[pos + 1..]))
}

fn decode_encryption(value: &[u8]) -> Result<Frame, ProtocolError> {
    let algorithm = *value.first().ok_or(ProtocolError::Truncated { claimed: 1, available: 0 })?;
    let rest = &value[1..];
    let sender_len = *rest.first().ok_or(ProtocolError::Truncated { claimed: 1, available: 0 })? as usize;
    let rest2 = rest.get(1..).ok_or(ProtocolError::Truncated { claimed: 1, available: 0 })?;
    let sender_bytes = rest2.get(..sender_len).ok_or(ProtocolError::Truncated {
        claimed: sender_len,
        available: rest2.len(),
    })?;
    let rest3 = &rest2[sender_len..];
    let receiver_len = *rest3.first().ok_or(ProtocolError::Truncated { claimed: 1, available: 0 })? as usize;
    let rest4 = rest3.get(1..).ok_or(ProtocolError::Truncated { claimed: 1, available: 0 })?;
    let receiver_bytes = rest4.get(..receiver_len).ok_or(ProtocolError::Truncated {
        claimed: receiver_len,
        available: rest4.len(),
    })?;
    if rest4.len() != receiver_len {
        return Err(ProtocolError::Truncated { claimed: receiver_len, available: rest4.len() });
    }
    let sender_key_id = String::from_utf8(sender_bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
    let receiver_key_id = String::from_utf8(receiver_bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(Frame::Encryption { algorithm, sender_key_id, receiver_key_id })
}

/// Address encoding used inside [`Frame::Address`]/[`Frame::IpPort`]: a
/// 1-byte discriminant, a 2-byte IANA address-family number, then the
/// family-specific body.
fn encode_netaddr(addr: &NetAddr, out: &mut Vec<u8>) {
    out.extend_from_slice(&addr.addr_family().to_be_bytes());
    match addr {
        NetAddr::V4(ip, _) => out.extend_from_slice(&ip.octets()),
        NetAddr::V6(ip, _) => out.extend_from_slice(&ip.octets()),
        NetAddr::Mac48(mac) => {
            out.push(mac.len() as u8);
            out.extend_from_slice(mac);
        }
        NetAddr::Mac64(mac) => {
            out.push(mac.len() as u8);
            out.extend_from_slice(mac);
        }
        NetAddr::Other { body, .. } => {
            out.push(body.len() as u8);
            out.extend_from_slice(body);
        }
    }
}

fn decode_netaddr(value: &[u8]) -> Result<(NetAddr, &[u8]), ProtocolError> {
    let family = tlv::get_u16(value).ok_or(ProtocolError::MalformedAddress)?;
    let rest = &value[2..];
    match family {
        f if f == crate::netaddr::family::IPV4 => {
            let bytes = rest.get(..4).ok_or(ProtocolError::MalformedAddress)?;
            let ip = std::net::Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
            Ok((NetAddr::V4(ip, 0), &rest[4..]))
        }
        f if f == crate::netaddr::family::IPV6 => {
            let bytes = rest.get(..16).ok_or(ProtocolError::MalformedAddress)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ok((NetAddr::V6(std::net::Ipv6Addr::from(octets), 0), &rest[16..]))
        }
        f if f == crate::netaddr::family::MAC => {
            let len = *rest.first().ok_or(ProtocolError::MalformedAddress)? as usize;
            let body = rest.get(1..1 + len).ok_or(ProtocolError::MalformedAddress)?;
            let remainder = &rest[1 + len..];
            match len {
                6 => {
                    let mut mac = [0u8; 6];
                    mac.copy_from_slice(body);
                    Ok((NetAddr::Mac48(mac), remainder))
                }
                8 => {
                    let mut mac = [0u8; 8];
                    mac.copy_from_slice(body);
                    Ok((NetAddr::Mac64(mac), remainder))
                }
                _ => Err(ProtocolError::MalformedAddress),
            }
        }
        other => {
            let len = *rest.first().ok_or(ProtocolError::MalformedAddress)? as usize;
            let body = rest.get(1..1 + len).ok_or(ProtocolError::MalformedAddress)?;
            let remainder = &rest[1 + len..];
            Ok((NetAddr::Other { addr_family: other, body: body.to_vec(), port: 0 }, remainder))
        }
    }
}
