//! Compression algorithms selectable by the compression frame's 1-byte
//! algorithm code.
//!
//! Grounded in `examples/other_examples`' use of `flate2` for the same
//! purpose — the teacher crate has no compression layer of its own, so this
//! module's shape (pure functions, algorithm code dispatch) follows
//! [`crate::frame`]'s pattern rather than a specific teacher file.

use std::io::{Read, Write};

use flate2::Compression as Zlib;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::ProtocolError;

/// Compression algorithm codes carried in a compression frame.
pub mod algorithm {
    /// No compression.
    pub const NONE: u8 = 0;
    /// Zlib (DEFLATE with a zlib header/trailer).
    pub const ZLIB: u8 = 1;
}

/// Hard ceiling on the size a single decompression may expand to, regardless
/// of what the compression frame's `decompressed_size` field claims. Guards
/// against a zip-bomb-style datagram even if the declared size itself was
/// small enough to pass the per-frame check.
pub const MAX_DECOMPRESSED_SIZE: usize = 16 << 20; // 16 MiB

/// Compresses `data` under the given algorithm, returning the compressed
/// bytes and the original (decompressed) length to stamp into the
/// compression frame.
pub fn compress(algorithm: u8, data: &[u8]) -> Result<(Vec<u8>, u32), ProtocolError> {
    match algorithm {
        algorithm::NONE => Ok((data.to_vec(), data.len() as u32)),
        algorithm::ZLIB => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Zlib::default());
            encoder.write_all(data).map_err(|e| ProtocolError::CodecError(e.to_string()))?;
            let compressed = encoder.finish().map_err(|e| ProtocolError::CodecError(e.to_string()))?;
            Ok((compressed, data.len() as u32))
        }
        other => Err(ProtocolError::CodecError(format!("unsupported compression algorithm {other}"))),
    }
}

/// Decompresses `data` under the given algorithm, refusing to produce more
/// than `declared_size` bytes (the size the sender's compression frame
/// claimed) or [`MAX_DECOMPRESSED_SIZE`], whichever is smaller.
pub fn decompress(algorithm: u8, data: &[u8], declared_size: u32) -> Result<Vec<u8>, ProtocolError> {
    let limit = (declared_size as usize).min(MAX_DECOMPRESSED_SIZE);
    if declared_size as usize > MAX_DECOMPRESSED_SIZE {
        return Err(ProtocolError::DecompressionTooLarge { actual: declared_size as usize, limit: MAX_DECOMPRESSED_SIZE });
    }
    match algorithm {
        algorithm::NONE => Ok(data.to_vec()),
        algorithm::ZLIB => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(limit.min(1 << 16));
            // Read one byte beyond the limit so an over-long stream is
            // detected as a size violation rather than silently truncated.
            let mut capped = (&mut decoder).take(limit as u64 + 1);
            capped.read_to_end(&mut out).map_err(|e| ProtocolError::CodecError(e.to_string()))?;
            if out.len() > limit {
                return Err(ProtocolError::DecompressionTooLarge { actual: out.len(), limit });
            }
            Ok(out)
        }
        other => Err(ProtocolError::CodecError(format!("unsupported compression algorithm {other}"))),
    }
}
