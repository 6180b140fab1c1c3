//! Per-file symmetric keys
//!
//! Every uploaded file gets its own freshly generated 256-bit key. On the wire
//! and at rest the key travels as 64 lowercase hex characters.

use crate::{CryptoError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Length of the hex encoding of a key
pub const KEY_HEX_LEN: usize = KEY_SIZE * 2;

/// Size of a nonce in bytes (96 bits for AES-GCM)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// A 256-bit key that encrypts exactly one file
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random key from the operating system CSPRNG.
    ///
    /// An entropy failure is reported, never retried.
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_SIZE];
        OsRng.try_fill_bytes(&mut key)?;
        Ok(Self { key })
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::MalformedKey(format!(
                "key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Encode as 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    /// Decode from 64 hex characters
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != KEY_HEX_LEN {
            return Err(CryptoError::MalformedKey(format!(
                "hex key must be {} characters, got {}",
                KEY_HEX_LEN,
                s.len()
            )));
        }
        let mut bytes = hex::decode(s)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

impl Serialize for SymmetricKey {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SymmetricKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = zeroize::Zeroizing::new(String::deserialize(d)?);
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Generate a fresh key (free-function form of [`SymmetricKey::generate`])
pub fn generate() -> Result<SymmetricKey> {
    SymmetricKey::generate()
}

/// Encode a key as lowercase hex
pub fn encode_hex(key: &SymmetricKey) -> String {
    key.to_hex()
}

/// Decode a key from hex, failing with `MalformedKey`
pub fn decode_hex(s: &str) -> Result<SymmetricKey> {
    SymmetricKey::from_hex(s)
}
