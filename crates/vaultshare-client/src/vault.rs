//! Encrypt-before-upload file operations
//!
//! Every operation checks the session first; an unverified session fails with
//! `SessionNotVerified` before anything is sent. Keys and plaintext never leave
//! this module except as the hex key the backend stores alongside each blob.

use crate::backend::{with_deadline, Backend};
use crate::config::ClientConfig;
use crate::session::Session;
use crate::sharing::{ShareGrant, ShareParams, SharedFile};
use crate::types::*;
use crate::{Result, VaultError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use vaultshare_crypto::{EncryptedBlob, FileCipher, SymmetricKey, ALGORITHM};

/// Orchestrates crypto and backend calls for a session
#[derive(Clone)]
pub struct VaultService {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl VaultService {
    /// Create a service over `backend`
    pub fn new(backend: Arc<dyn Backend>, config: &ClientConfig) -> Self {
        Self {
            backend,
            timeout: config.timeout,
        }
    }

    /// Encrypt `plaintext` under a fresh key and store it as `name`
    #[instrument(skip(self, session, plaintext), fields(len = plaintext.len()))]
    pub async fn upload(&self, session: &Session, plaintext: &[u8], name: &str) -> Result<FileRecord> {
        let access = session.verified_access()?;

        let key = SymmetricKey::generate()?;
        let blob = FileCipher::new(&key).encrypt(plaintext)?;
        debug!(algorithm = ALGORITHM, sealed = blob.len(), "sealed file");

        let upload = FileUpload {
            name: name.to_string(),
            key: WireKey::from(&key),
            ciphertext: blob.into_bytes(),
        };
        let record = with_deadline(self.timeout, self.backend.upload(&access, upload)).await?;
        info!(file = %record.id, "uploaded");
        Ok(record)
    }

    /// Fetch and decrypt a file for keeping.
    ///
    /// Needs ownership or an active `DOWNLOAD` share.
    #[instrument(skip(self, session))]
    pub async fn download(&self, session: &Session, id: FileId) -> Result<Vec<u8>> {
        self.decrypt_file(session, id, Disposition::Download).await
    }

    /// Fetch and decrypt a file for display.
    ///
    /// Any active share suffices.
    #[instrument(skip(self, session))]
    pub async fn view(&self, session: &Session, id: FileId) -> Result<Vec<u8>> {
        self.decrypt_file(session, id, Disposition::View).await
    }

    async fn decrypt_file(&self, session: &Session, id: FileId, disposition: Disposition) -> Result<Vec<u8>> {
        let access = session.verified_access()?;
        let fetched =
            with_deadline(self.timeout, self.backend.fetch(&access, id, disposition)).await?;

        let key = match &fetched.key {
            Some(key) if !key.is_empty() => key.decode()?,
            _ => return Err(VaultError::KeyUnavailable(id)),
        };
        let blob = EncryptedBlob::from_bytes(fetched.ciphertext.clone())?;
        let plaintext = FileCipher::new(&key).decrypt(&blob)?;
        debug!(len = plaintext.len(), "opened");
        Ok(plaintext)
    }

    /// Grant `params.recipient` access to `file`.
    ///
    /// The grant is validated locally before the key is touched; the backend
    /// checks ownership and that the recipient exists.
    #[instrument(skip(self, session, file), fields(file = %file.id))]
    pub async fn share(&self, session: &Session, file: &FileRecord, params: ShareParams) -> Result<ShareGrant> {
        let access = session.verified_access()?;

        let now = Utc::now();
        params.validate(now)?;
        let key = file.key.decode()?;
        let grant = ShareGrant::create(file, &params, &key, now)?;

        let stored = with_deadline(self.timeout, self.backend.share(&access, &grant)).await?;
        info!(
            recipient = %stored.recipient,
            permission = %stored.permission,
            "shared"
        );
        Ok(stored)
    }

    /// Resolve a share link handed out by the owner.
    ///
    /// The backend refuses expired links and links meant for someone else.
    #[instrument(skip(self, session))]
    pub async fn open_share(&self, session: &Session, token: Uuid) -> Result<SharedFile> {
        let access = session.verified_access()?;
        let shared = with_deadline(self.timeout, self.backend.shared_by_token(&access, token)).await?;
        debug!(file = %shared.file.id, permission = %shared.permission, "share link resolved");
        Ok(shared)
    }

    /// Files owned by the session user
    #[instrument(skip_all)]
    pub async fn list_files(&self, session: &Session) -> Result<Vec<FileRecord>> {
        let access = session.verified_access()?;
        with_deadline(self.timeout, self.backend.list_files(&access)).await
    }

    /// Files shared with the session user, expired shares included
    #[instrument(skip_all)]
    pub async fn list_shared_with_me(&self, session: &Session) -> Result<Vec<SharedFile>> {
        let access = session.verified_access()?;
        with_deadline(self.timeout, self.backend.list_shared_with_me(&access)).await
    }

    /// Delete an owned file
    #[instrument(skip(self, session))]
    pub async fn delete(&self, session: &Session, id: FileId) -> Result<()> {
        let access = session.verified_access()?;
        with_deadline(self.timeout, self.backend.delete(&access, id)).await?;
        info!("deleted");
        Ok(())
    }

    /// Sealed size of an upload of `len` bytes
    pub fn sealed_len(len: usize) -> usize {
        vaultshare_crypto::sealed_len(len)
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
