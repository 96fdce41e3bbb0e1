//! In-memory key registry: key ids, the identities they belong to, and the
//! per-destination key id a sender should encrypt to.
//!
//! Grounded in the original's `cryptframe.h` free-function API
//! (`cryptframe_associate_identity`, `cryptframe_set_signing_key_id`,
//! `cryptframe_set_dest_key_id`, ...), which is all global mutable state
//! behind a `GHashTable`. This rewrite keeps the same responsibilities but
//! as an owned, injectable `KeyRegistry` value instead of process-global
//! state, so multiple registries (e.g. one per test) can coexist.

use std::collections::HashMap;

use nanoprobe_proto::NetAddr;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// A public key's raw bytes plus which identity it belongs to.
#[derive(Debug, Clone)]
pub struct PublicKeyEntry {
    /// Identity (e.g. hostname or principal name) this key speaks for.
    pub identity: String,
    /// Raw public key bytes (algorithm-specific length).
    pub bytes: Vec<u8>,
}

/// A private key's raw bytes. Zeroized on drop since this is the one thing
/// in this crate that must never leak into a core dump or swap file
/// unnecessarily.
#[derive(Clone)]
pub struct PrivateKeyEntry {
    /// Raw private key bytes (algorithm-specific length).
    pub bytes: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for PrivateKeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyEntry").field("bytes", &"<redacted>").finish()
    }
}

/// Holds every key this nanoprobe knows about: its own signing identity,
/// the public keys of peers it can verify or encrypt to, and which key id
/// to use when sending to a given destination address.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    public_keys: HashMap<String, PublicKeyEntry>,
    private_keys: HashMap<String, PrivateKeyEntry>,
    identity_to_key_ids: HashMap<String, Vec<String>>,
    signing_key_id: Option<String>,
    verify_key_id: Option<String>,
    dest_key_ids: HashMap<NetAddr, String>,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a public key under `key_id`, associated with `identity`.
    pub fn add_public_key(&mut self, key_id: impl Into<String>, identity: impl Into<String>, bytes: Vec<u8>) {
        let key_id = key_id.into();
        let identity = identity.into();
        self.identity_to_key_ids.entry(identity.clone()).or_default().push(key_id.clone());
        self.public_keys.insert(key_id, PublicKeyEntry { identity, bytes });
    }

    /// Registers a private key under `key_id`. Never sent on the wire; only
    /// used locally for signing or decryption.
    pub fn add_private_key(&mut self, key_id: impl Into<String>, bytes: Vec<u8>) {
        self.private_keys.insert(key_id.into(), PrivateKeyEntry { bytes: Zeroizing::new(bytes) });
    }

    /// Removes every key registered under `key_id`, public and private.
    pub fn purge_key_id(&mut self, key_id: &str) {
        if let Some(entry) = self.public_keys.remove(key_id) {
            if let Some(ids) = self.identity_to_key_ids.get_mut(&entry.identity) {
                ids.retain(|id| id != key_id);
            }
        }
        self.private_keys.remove(key_id);
    }

    /// Looks up a public key by id.
    pub fn public_key(&self, key_id: &str) -> Result<&PublicKeyEntry, CryptoError> {
        self.public_keys.get(key_id).ok_or_else(|| CryptoError::UnknownKeyId(key_id.to_string()))
    }

    /// Looks up a private key by id.
    pub fn private_key(&self, key_id: &str) -> Result<&PrivateKeyEntry, CryptoError> {
        self.private_keys.get(key_id).ok_or_else(|| CryptoError::NoPrivateKey(key_id.to_string()))
    }

    /// All key ids registered for a given identity.
    #[must_use]
    pub fn key_ids_for(&self, identity: &str) -> &[String] {
        self.identity_to_key_ids.get(identity).map_or(&[], Vec::as_slice)
    }

    /// The identity a public key id belongs to, if registered.
    #[must_use]
    pub fn identity_for_key_id(&self, key_id: &str) -> Option<&str> {
        self.public_keys.get(key_id).map(|e| e.identity.as_str())
    }

    /// Sets which private key id this nanoprobe signs outgoing framesets
    /// with.
    pub fn set_signing_key_id(&mut self, key_id: impl Into<String>) {
        self.signing_key_id = Some(key_id.into());
    }

    /// The currently configured signing key id.
    #[must_use]
    pub fn signing_key_id(&self) -> Option<&str> {
        self.signing_key_id.as_deref()
    }

    /// The private key to sign with, per [`KeyRegistry::signing_key_id`].
    pub fn signing_key(&self) -> Result<&PrivateKeyEntry, CryptoError> {
        let id = self.signing_key_id.as_ref().ok_or(CryptoError::NoSigningKey)?;
        self.private_key(id)
    }

    /// Sets which public key id incoming signatures are verified against.
    /// Unlike [`KeyRegistry::set_signing_key_id`] (this node's own private
    /// key), this names the peer's key — a signature frame carries no key
    /// id of its own, so the verifier must already know whose key to check.
    pub fn set_verify_key_id(&mut self, key_id: impl Into<String>) {
        self.verify_key_id = Some(key_id.into());
    }

    /// The currently configured verification key id.
    #[must_use]
    pub fn verify_key_id(&self) -> Option<&str> {
        self.verify_key_id.as_deref()
    }

    /// The public key to verify incoming signatures with, per
    /// [`KeyRegistry::verify_key_id`]. Also accepts a private key entry, so
    /// the symmetric algorithms (HMAC/CRC32) can share one registered secret
    /// for both signing and verifying.
    pub fn verify_key(&self) -> Result<&[u8], CryptoError> {
        let id = self.verify_key_id.as_ref().ok_or(CryptoError::NoVerifyKey)?;
        if let Some(entry) = self.public_keys.get(id) {
            return Ok(&entry.bytes);
        }
        self.private_keys.get(id).map(|entry| entry.bytes.as_slice()).ok_or_else(|| CryptoError::NoPrivateKey(id.clone()))
    }

    /// Associates `destination` with the public key id to encrypt messages
    /// to it with.
    pub fn set_dest_key_id(&mut self, destination: NetAddr, key_id: impl Into<String>) {
        self.dest_key_ids.insert(destination, key_id.into());
    }

    /// The key id to encrypt to for `destination`, if one has been set.
    #[must_use]
    pub fn dest_key_id(&self, destination: &NetAddr) -> Option<&str> {
        self.dest_key_ids.get(destination).map(String::as_str)
    }
}
