//! # Vaultshare Crypto
//!
//! Cryptographic primitives for the Vaultshare encrypt-before-upload vault.
//!
//! This crate provides:
//! - **Key material**: fresh 256-bit keys per file, hex encoded for transport
//! - **File cipher**: AES-256-GCM sealing of whole files as `nonce || ciphertext || tag`
//!
//! ## Security Model
//!
//! - All encryption happens client-side
//! - Storage only ever receives sealed blobs
//! - A blob that fails authentication yields no plaintext at all
//!
//! ## Example
//!
//! ```rust
//! use vaultshare_crypto::{SymmetricKey, FileCipher};
//!
//! let key = SymmetricKey::generate()?;
//! let cipher = FileCipher::new(&key);
//!
//! let blob = cipher.encrypt(b"Hello, World!")?;
//! let plaintext = cipher.decrypt(&blob)?;
//! assert_eq!(plaintext, b"Hello, World!");
//! # Ok::<(), vaultshare_crypto::CryptoError>(())
//! ```

pub mod error;
pub mod keys;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use keys::{SymmetricKey, KEY_HEX_LEN, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use symmetric::{sealed_len, EncryptedBlob, FileCipher, Nonce};

/// Algorithm identifier reported alongside uploads
pub const ALGORITHM: &str = "AES-256-GCM";
