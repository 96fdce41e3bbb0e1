//! Signature algorithms selectable by the signature frame's 1-byte
//! algorithm code.
//!
//! All functions are pure: they take key material and bytes in, and return
//! signature bytes or a verification result, mirroring the teacher crate's
//! "pure functions, caller supplies randomness/keys" style so these are
//! trivially testable without any ambient state.

use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

/// Signature algorithm codes carried in a signature frame.
pub mod algorithm {
    /// CRC32 checksum: integrity only, no authentication.
    pub const CRC32: u8 = 0;
    /// HMAC-SHA256: symmetric-key authentication.
    pub const HMAC_SHA256: u8 = 1;
    /// Ed25519: asymmetric digital signature.
    pub const ED25519: u8 = 2;
}

type HmacSha256 = Hmac<Sha256>;

/// Computes the signature of `data` under the given algorithm and key.
///
/// For [`algorithm::CRC32`], `key` is ignored. For [`algorithm::HMAC_SHA256`],
/// `key` is the shared HMAC key (any length). For [`algorithm::ED25519`],
/// `key` must be exactly 32 bytes (the Ed25519 signing key seed).
pub fn sign(algorithm: u8, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        algorithm::CRC32 => Ok(crc32fast::hash(data).to_be_bytes().to_vec()),
        algorithm::HMAC_SHA256 => {
            // `Hmac::new_from_slice` only rejects a key length that overflows
            // the underlying block size counter; SHA-256's 64-byte block
            // size makes that unreachable for any key we'd plausibly load.
            #[allow(clippy::expect_used)]
            let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        algorithm::ED25519 => {
            let seed: [u8; 32] = key
                .try_into()
                .map_err(|_| CryptoError::WrongKeyLength {
                    key_id: String::new(),
                    expected: 32,
                    actual: key.len(),
                })?;
            let signing_key = SigningKey::from_bytes(&seed);
            Ok(signing_key.sign(data).to_bytes().to_vec())
        }
        other => Err(CryptoError::UnsupportedSignatureAlgorithm(other)),
    }
}

/// Verifies `signature` over `data` under the given algorithm and key.
///
/// For [`algorithm::ED25519`], `key` is the 32-byte verifying (public) key.
pub fn verify(algorithm: u8, key: &[u8], data: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    match algorithm {
        algorithm::CRC32 => {
            let expected = crc32fast::hash(data).to_be_bytes();
            if expected.as_slice() == signature {
                Ok(())
            } else {
                Err(CryptoError::SignatureMismatch)
            }
        }
        algorithm::HMAC_SHA256 => {
            // `Hmac::new_from_slice` only rejects a key length that overflows
            // the underlying block size counter; SHA-256's 64-byte block
            // size makes that unreachable for any key we'd plausibly load.
            #[allow(clippy::expect_used)]
            let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.verify_slice(signature).map_err(|_| CryptoError::SignatureMismatch)
        }
        algorithm::ED25519 => {
            let key_bytes: [u8; 32] = key
                .try_into()
                .map_err(|_| CryptoError::WrongKeyLength {
                    key_id: String::new(),
                    expected: 32,
                    actual: key.len(),
                })?;
            let verifying_key =
                VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::SignatureMismatch)?;
            let sig_bytes: [u8; 64] = signature
                .try_into()
                .map_err(|_| CryptoError::SignatureMismatch)?;
            let signature = Signature::from_bytes(&sig_bytes);
            verifying_key.verify(data, &signature).map_err(|_| CryptoError::SignatureMismatch)
        }
        other => Err(CryptoError::UnsupportedSignatureAlgorithm(other)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn crc32_round_trip() {
        let data = b"heartbeat from host1";
        let signature = sign(algorithm::CRC32, &[], data).unwrap();
        assert!(verify(algorithm::CRC32, &[], data, &signature).is_ok());
    }

    #[test]
    fn crc32_detects_tamper() {
        let data = b"heartbeat from host1";
        let signature = sign(algorithm::CRC32, &[], data).unwrap();
        assert!(verify(algorithm::CRC32, &[], b"heartbeat from host2", &signature).is_err());
    }

    #[test]
    fn hmac_round_trip() {
        let key = b"shared secret key material";
        let data = b"discovery payload bytes";
        let signature = sign(algorithm::HMAC_SHA256, key, data).unwrap();
        assert!(verify(algorithm::HMAC_SHA256, key, data, &signature).is_ok());
    }

    #[test]
    fn hmac_wrong_key_fails() {
        let data = b"discovery payload bytes";
        let signature = sign(algorithm::HMAC_SHA256, b"key-a", data).unwrap();
        assert!(verify(algorithm::HMAC_SHA256, b"key-b", data, &signature).is_err());
    }

    #[test]
    fn ed25519_round_trip() {
        let seed = [7u8; 32];
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        let data = b"startup announcement";
        let signature = sign(algorithm::ED25519, &seed, data).unwrap();
        assert!(verify(algorithm::ED25519, verifying_key.as_bytes(), data, &signature).is_ok());
    }

    #[test]
    fn ed25519_wrong_length_key_errors() {
        let result = sign(algorithm::ED25519, &[1, 2, 3], b"data");
        assert!(matches!(result, Err(CryptoError::WrongKeyLength { expected: 32, actual: 3, .. })));
    }

    #[test]
    fn unsupported_algorithm_errors() {
        assert_eq!(sign(99, &[], b"data"), Err(CryptoError::UnsupportedSignatureAlgorithm(99)));
    }
}
