//! Error taxonomy for key management, signing, and encryption.

use thiserror::Error;

/// Everything that can go wrong looking up keys or running a crypto
/// operation against attacker-controlled bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// No key is registered under this key id.
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// A key id was looked up that exists but isn't the kind requested
    /// (e.g. a public key requested where a private key is needed).
    #[error("key id {0} has no private key material")]
    NoPrivateKey(String),

    /// No signing identity has been configured yet.
    #[error("no signing key id has been set")]
    NoSigningKey,

    /// No verification identity has been configured yet.
    #[error("no verify key id has been set")]
    NoVerifyKey,

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureMismatch,

    /// An unrecognized signature algorithm code was encountered.
    #[error("unsupported signature algorithm code: {0}")]
    UnsupportedSignatureAlgorithm(u8),

    /// An unrecognized encryption algorithm code was encountered.
    #[error("unsupported encryption algorithm code: {0}")]
    UnsupportedEncryptionAlgorithm(u8),

    /// AEAD decryption failed (wrong key, tampered ciphertext, or wrong
    /// nonce).
    #[error("decryption failed")]
    DecryptionFailed,

    /// A key's raw bytes were the wrong length for the algorithm selected.
    #[error("key material for {key_id} has wrong length: expected {expected}, got {actual}")]
    WrongKeyLength {
        /// The offending key id.
        key_id: String,
        /// Length the algorithm requires.
        expected: usize,
        /// Length actually present.
        actual: usize,
    },
}
