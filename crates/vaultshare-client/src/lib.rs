//! # Vaultshare Client SDK
//!
//! Client for the Vaultshare file vault. Files are sealed with AES-256-GCM
//! before they leave the process; the backend only ever stores ciphertext and
//! the hex key that goes with it.
//!
//! ## Features
//!
//! - **Encrypt before upload**: a fresh key per file
//! - **MFA-gated sessions**: file operations require a verified TOTP code
//! - **Sharing**: `VIEW` or `DOWNLOAD` grants with optional expiry
//! - **Pluggable backend**: HTTP for the real service, in-memory for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultshare_client::{ClientConfig, HttpBackend, Session, VaultService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vaultshare_client::VaultError> {
//!     let config = ClientConfig::new("http://localhost:8000/api/v1");
//!     let backend = Arc::new(HttpBackend::new(&config)?);
//!
//!     let session = Session::new(backend.clone(), &config);
//!     session.login("alice", "Secret123!@#").await?;
//!     session.verify_mfa("123456").await?;
//!
//!     let vault = VaultService::new(backend, &config);
//!     let record = vault.upload(&session, b"hello world", "a.txt").await?;
//!     let plaintext = vault.download(&session, record.id).await?;
//!     assert_eq!(plaintext, b"hello world");
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod error;
mod http;
pub mod memory;
mod session;
pub mod sharing;
pub mod types;
mod vault;

pub use backend::{with_deadline, Backend};
pub use config::ClientConfig;
pub use error::{ErrorCategory, Result, VaultError};
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use session::{AuthState, Session};
pub use sharing::{ShareDisplay, ShareGrant, ShareParams, ShareStatus, SharedFile};
pub use types::*;
pub use vault::VaultService;

// Re-export crypto types
pub use vaultshare_crypto::{CryptoError, EncryptedBlob, FileCipher, SymmetricKey};
