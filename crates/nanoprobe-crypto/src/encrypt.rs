//! Encryption algorithms selectable by the encryption frame's 1-byte
//! algorithm code.
//!
//! All functions are pure: key material, nonce material, and plaintext go
//! in, ciphertext comes out. Callers supply the nonce's random component so
//! tests can be deterministic, mirroring the teacher crate's message
//! encryption functions.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Encryption algorithm codes carried in an encryption frame.
pub mod algorithm {
    /// No encryption.
    pub const NONE: u8 = 0;
    /// `XChaCha20-Poly1305` AEAD.
    pub const XCHACHA20_POLY1305: u8 = 1;
}

/// Size of the random suffix packed into the nonce alongside a counter.
pub const NONCE_RANDOM_SIZE: usize = 16;

const DERIVE_LABEL: &[u8] = b"nanoprobe-cryptframe-v1";

/// Derives a 32-byte symmetric key shared between a sender and receiver key
/// id pair, deterministically, from each side's raw key material via HKDF.
///
/// Order-independent: `derive_shared_key(a, b, secret)` equals
/// `derive_shared_key(b, a, secret)` is NOT guaranteed — the sender/receiver
/// roles are part of the derivation input so a compromised sender key
/// cannot be replayed as if it were the receiver's.
#[must_use]
pub fn derive_shared_key(sender_key_id: &str, receiver_key_id: &str, shared_secret: &[u8]) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut info = Vec::with_capacity(DERIVE_LABEL.len() + sender_key_id.len() + receiver_key_id.len() + 2);
    info.extend_from_slice(DERIVE_LABEL);
    info.extend_from_slice(sender_key_id.as_bytes());
    info.push(0);
    info.extend_from_slice(receiver_key_id.as_bytes());
    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

/// Encrypts `plaintext` under the given algorithm and 32-byte key.
///
/// For [`algorithm::NONE`], returns `plaintext` unchanged with an
/// all-zero nonce. For [`algorithm::XCHACHA20_POLY1305`], `sequence` (a
/// monotonic counter unique per key) and `random_suffix` together form the
/// 24-byte nonce, and the returned bytes are `nonce || ciphertext`.
pub fn encrypt(
    algorithm: u8,
    key: &[u8; 32],
    sequence: u64,
    random_suffix: [u8; NONCE_RANDOM_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        algorithm::NONE => Ok(plaintext.to_vec()),
        algorithm::XCHACHA20_POLY1305 => {
            let nonce = build_nonce(sequence, random_suffix);
            let cipher = XChaCha20Poly1305::new(key.into());
            let ciphertext = cipher
                .encrypt(XNonce::from_slice(&nonce), plaintext)
                .map_err(|_| CryptoError::DecryptionFailed)?;
            let mut out = Vec::with_capacity(24 + ciphertext.len());
            out.extend_from_slice(&nonce);
            out.extend_from_slice(&ciphertext);
            Ok(out)
        }
        other => Err(CryptoError::UnsupportedEncryptionAlgorithm(other)),
    }
}

/// Decrypts bytes produced by [`encrypt`] under the given algorithm and key.
pub fn decrypt(algorithm: u8, key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        algorithm::NONE => Ok(data.to_vec()),
        algorithm::XCHACHA20_POLY1305 => {
            if data.len() < 24 {
                return Err(CryptoError::DecryptionFailed);
            }
            let (nonce, ciphertext) = data.split_at(24);
            let cipher = XChaCha20Poly1305::new(key.into());
            cipher
                .decrypt(XNonce::from_slice(nonce), ciphertext)
                .map_err(|_| CryptoError::DecryptionFailed)
        }
        other => Err(CryptoError::UnsupportedEncryptionAlgorithm(other)),
    }
}

/// Builds a 24-byte `XChaCha20` nonce: an 8-byte big-endian sequence
/// counter followed by the caller-supplied random suffix.
fn build_nonce(sequence: u64, random_suffix: [u8; NONCE_RANDOM_SIZE]) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    nonce[0..8].copy_from_slice(&sequence.to_be_bytes());
    nonce[8..24].copy_from_slice(&random_suffix);
    nonce
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn derive_shared_key_is_deterministic() {
        let a = derive_shared_key("alice", "bob", b"shared-secret-material");
        let b = derive_shared_key("alice", "bob", b"shared-secret-material");
        assert_eq!(a, b);
    }

    #[test]
    fn derive_shared_key_depends_on_roles() {
        let forward = derive_shared_key("alice", "bob", b"shared-secret-material");
        let reverse = derive_shared_key("bob", "alice", b"shared-secret-material");
        assert_ne!(forward, reverse);
    }

    #[test]
    fn xchacha_round_trip() {
        let key = derive_shared_key("alice", "bob", b"shared-secret-material");
        let plaintext = b"discovery payload";
        let ciphertext =
            encrypt(algorithm::XCHACHA20_POLY1305, &key, 1, [0xAB; NONCE_RANDOM_SIZE], plaintext).unwrap();
        let decrypted = decrypt(algorithm::XCHACHA20_POLY1305, &key, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = derive_shared_key("alice", "bob", b"shared-secret-material");
        let mut ciphertext =
            encrypt(algorithm::XCHACHA20_POLY1305, &key, 1, [0; NONCE_RANDOM_SIZE], b"data").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert_eq!(decrypt(algorithm::XCHACHA20_POLY1305, &key, &ciphertext), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn wrong_key_fails() {
        let key_a = derive_shared_key("alice", "bob", b"secret-a");
        let key_b = derive_shared_key("alice", "bob", b"secret-b");
        let ciphertext =
            encrypt(algorithm::XCHACHA20_POLY1305, &key_a, 1, [0; NONCE_RANDOM_SIZE], b"data").unwrap();
        assert_eq!(decrypt(algorithm::XCHACHA20_POLY1305, &key_b, &ciphertext), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn none_algorithm_passes_through() {
        let key = [0u8; 32];
        let data = b"plain bytes";
        let out = encrypt(algorithm::NONE, &key, 0, [0; NONCE_RANDOM_SIZE], data).unwrap();
        assert_eq!(out, data);
        assert_eq!(decrypt(algorithm::NONE, &key, &out).unwrap(), data);
    }

    #[test]
    fn different_sequence_numbers_change_ciphertext() {
        let key = derive_shared_key("alice", "bob", b"shared-secret-material");
        let c1 = encrypt(algorithm::XCHACHA20_POLY1305, &key, 1, [0; NONCE_RANDOM_SIZE], b"data").unwrap();
        let c2 = encrypt(algorithm::XCHACHA20_POLY1305, &key, 2, [0; NONCE_RANDOM_SIZE], b"data").unwrap();
        assert_ne!(c1, c2);
    }
}
