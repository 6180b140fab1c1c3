//! Authenticated file encryption using AES-256-GCM
//!
//! A sealed file is a single buffer:
//!
//! ```text
//! [ nonce (12 bytes) ][ ciphertext ][ tag (16 bytes) ]
//! ```
//!
//! No associated data is bound. The whole file is processed in memory, so very
//! large files cost their full size in RAM twice during a call.

use crate::{
    keys::{SymmetricKey, NONCE_SIZE, TAG_SIZE},
    CryptoError, Result,
};
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;

/// A nonce for AEAD encryption
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self { bytes })
    }

    /// Get the nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

/// Nonce followed by AEAD ciphertext and tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedBlob {
    bytes: Bytes,
}

impl EncryptedBlob {
    /// Wrap bytes received from storage.
    ///
    /// Fails with `MalformedBlob` when the buffer cannot even hold a nonce.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < NONCE_SIZE {
            return Err(CryptoError::MalformedBlob {
                len: bytes.len(),
                min: NONCE_SIZE,
            });
        }
        Ok(Self { bytes })
    }

    fn seal(nonce: &Nonce, ciphertext: Vec<u8>) -> Self {
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&ciphertext);
        Self { bytes: Bytes::from(out) }
    }

    /// The leading nonce
    pub fn nonce(&self) -> &[u8] {
        &self.bytes[..NONCE_SIZE]
    }

    /// Ciphertext with its trailing tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[NONCE_SIZE..]
    }

    /// The whole blob
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// A blob always holds at least a nonce
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Consume into the underlying buffer
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Size of the blob produced for a plaintext of `len` bytes
pub fn sealed_len(len: usize) -> usize {
    NONCE_SIZE + len + TAG_SIZE
}

/// AES-256-GCM bound to one file key
pub struct FileCipher {
    cipher: Aes256Gcm,
}

impl FileCipher {
    /// Create a cipher for the given key
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt under a freshly drawn random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob> {
        let nonce = Nonce::generate()?;
        let ciphertext = self
            .cipher
            .encrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(EncryptedBlob::seal(&nonce, ciphertext))
    }

    /// Verify and decrypt. Nothing is returned unless the tag verifies.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(aes_gcm::Nonce::from_slice(blob.nonce()), blob.ciphertext())
            .map_err(|_| CryptoError::AuthenticationFailure)
    }

    /// Decrypt a raw buffer as received from storage
    pub fn decrypt_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let blob = EncryptedBlob::from_bytes(Bytes::copy_from_slice(bytes))?;
        self.decrypt(&blob)
    }
}

/// Encrypt data with a generated nonce (convenience function)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<EncryptedBlob> {
    FileCipher::new(key).encrypt(plaintext)
}

/// Decrypt a sealed blob (convenience function)
pub fn decrypt(key: &SymmetricKey, blob: &EncryptedBlob) -> Result<Vec<u8>> {
    FileCipher::new(key).decrypt(blob)
}
