//! The storage/auth backend the client talks to
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │        Session      │    VaultService    │
//! ├──────────────────────────────────────────┤
//! │              Backend trait               │
//! ├─────────────────────┬────────────────────┤
//! │     HttpBackend     │   MemoryBackend    │
//! └─────────────────────┴────────────────────┘
//! ```
//!
//! Every call is a suspension point. Callers bound each one with
//! [`with_deadline`]; dropping the future aborts the call.

use crate::sharing::{ShareGrant, SharedFile};
use crate::types::*;
use crate::{Result, VaultError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Operations the core needs from the backend collaborator
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /users/token/`
    async fn obtain_tokens(&self, credentials: &Credentials) -> Result<TokenPair>;

    /// `POST /users/token/refresh/`; returns a new access token
    async fn refresh_access(&self, refresh: &str) -> Result<String>;

    /// `POST /users/register/`
    async fn register(&self, registration: &Registration) -> Result<()>;

    /// `GET /users/me/`
    async fn profile(&self, access: &str) -> Result<UserProfile>;

    /// `GET /users/mfa/setup/`
    async fn mfa_setup(&self, access: &str) -> Result<MfaEnrollment>;

    /// `POST /users/mfa/setup/`; enables MFA once the first code checks out
    async fn mfa_confirm(&self, access: &str, code: &MfaCode) -> Result<()>;

    /// `POST /users/mfa/verify/`
    async fn mfa_verify(&self, access: &str, code: &MfaCode) -> Result<TokenPair>;

    /// `POST /users/mfa/disable/`
    async fn mfa_disable(&self, access: &str, code: &MfaCode) -> Result<()>;

    /// `POST /files/upload/`
    async fn upload(&self, access: &str, upload: FileUpload) -> Result<FileRecord>;

    /// `GET /files/`
    async fn list_files(&self, access: &str) -> Result<Vec<FileRecord>>;

    /// `GET /files/shared-with-me/`
    async fn list_shared_with_me(&self, access: &str) -> Result<Vec<SharedFile>>;

    /// `GET /files/share/{token}/`
    async fn shared_by_token(&self, access: &str, token: Uuid) -> Result<SharedFile>;

    /// Ciphertext from `GET /files/{id}/download/` plus the key served with it
    async fn fetch(&self, access: &str, id: FileId, disposition: Disposition)
        -> Result<FetchedFile>;

    /// `POST /files/share/`
    async fn share(&self, access: &str, grant: &ShareGrant) -> Result<ShareGrant>;

    /// `DELETE /files/{id}/`
    async fn delete(&self, access: &str, id: FileId) -> Result<()>;
}

/// Run a backend call, failing with `NetworkUnavailable` once `timeout` passes
pub async fn with_deadline<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(VaultError::NetworkUnavailable(format!(
            "backend did not answer within {:?}",
            timeout
        ))),
    }
}
