//! Error types for the vaultshare-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key text is not 64 hex characters, or key bytes are not 32 long
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Blob is too short to contain a nonce
    #[error("malformed blob: {len} bytes is shorter than the {min} byte nonce")]
    MalformedBlob { len: usize, min: usize },

    /// The AEAD tag did not verify: tampering, wrong key, or corruption
    #[error("authentication failure: ciphertext did not verify")]
    AuthenticationFailure,

    /// The operating system could not supply random bytes
    #[error("entropy source failure: {0}")]
    Entropy(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::MalformedKey(err.to_string())
    }
}

impl From<rand::Error> for CryptoError {
    fn from(err: rand::Error) -> Self {
        CryptoError::Entropy(err.to_string())
    }
}
