//! In-memory backend for testing and local development
//!
//! Mirrors the access rules of the real service: owners see their files,
//! recipients see shared files while the share is active, and downloads need a
//! `DOWNLOAD` share. MFA codes are fixed per account instead of time-based.
//! Every call is counted so tests can assert that nothing reached the backend.

use crate::backend::Backend;
use crate::sharing::{ShareGrant, SharedFile};
use crate::types::*;
use crate::{Result, VaultError};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
struct Account {
    id: u64,
    email: String,
    password: String,
    mfa_secret: Option<String>,
    mfa_enabled: bool,
    totp_code: Option<String>,
}

#[derive(Clone)]
struct StoredFile {
    record: FileRecord,
    blob: Bytes,
}

#[derive(Clone)]
struct StoredShare {
    id: ShareId,
    file_id: FileId,
    shared_by: String,
    shared_with: String,
    permission: Permission,
    expires_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
    key: WireKey,
    token: Uuid,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    files: BTreeMap<FileId, StoredFile>,
    shares: Vec<StoredShare>,
    next_user_id: u64,
    next_file_id: u64,
    next_share_id: u64,
}

impl MemoryState {
    fn user_for(&self, access: &str) -> Result<String> {
        self.access_tokens
            .get(access)
            .cloned()
            .ok_or(VaultError::Unauthorized)
    }

    fn issue_tokens(&mut self, username: &str) -> TokenPair {
        let pair = TokenPair {
            access: format!("access-{}", Uuid::new_v4().simple()),
            refresh: format!("refresh-{}", Uuid::new_v4().simple()),
        };
        self.access_tokens
            .insert(pair.access.clone(), username.to_string());
        self.refresh_tokens
            .insert(pair.refresh.clone(), username.to_string());
        pair
    }

    fn add_account(&mut self, username: &str, email: &str, password: &str) {
        self.next_user_id += 1;
        self.accounts.insert(
            username.to_string(),
            Account {
                id: self.next_user_id,
                email: email.to_string(),
                password: password.to_string(),
                mfa_secret: None,
                mfa_enabled: false,
                totp_code: None,
            },
        );
    }

    fn account_mut(&mut self, username: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(username)
            .ok_or_else(|| VaultError::NotFound(format!("user {}", username)))
    }

    fn check_code(&self, username: &str, code: &MfaCode, no_secret: &str) -> Result<()> {
        let account = self
            .accounts
            .get(username)
            .ok_or(VaultError::Unauthorized)?;
        if account.mfa_secret.is_none() {
            return Err(VaultError::MfaRejected {
                reason: no_secret.into(),
            });
        }
        if account.totp_code.as_deref() != Some(code.as_str()) {
            return Err(VaultError::MfaRejected {
                reason: "Invalid MFA token.".into(),
            });
        }
        Ok(())
    }

    fn shared_file(&self, share: &StoredShare) -> Option<SharedFile> {
        self.files.get(&share.file_id).map(|f| SharedFile {
            id: share.id,
            file: f.record.clone(),
            shared_by: share.shared_by.clone(),
            permission: share.permission,
            expires_at: share.expires_at,
            created_at: share.created_at,
            key: share.key.clone(),
        })
    }
}

const NOT_SET_UP: &str = "MFA is not set up for this user.";

/// An in-memory backend
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    calls: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account without MFA
    pub fn with_user(self, username: &str, password: &str) -> Self {
        let email = format!("{}@example.com", username);
        self.state.lock().add_account(username, &email, password);
        self
    }

    /// Add an account with MFA already enabled, accepting `code`
    pub fn with_mfa_user(self, username: &str, password: &str, code: &str) -> Self {
        let this = self.with_user(username, password);
        {
            let mut state = this.state.lock();
            if let Ok(account) = state.account_mut(username) {
                account.mfa_secret = Some(random_secret());
                account.mfa_enabled = true;
                account.totp_code = Some(code.to_string());
            }
        }
        this
    }

    /// Set the code an account's authenticator currently shows
    pub fn set_totp_code(&self, username: &str, code: &str) {
        if let Ok(account) = self.state.lock().account_mut(username) {
            account.totp_code = Some(code.to_string());
        }
    }

    /// Number of backend calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every call fail as if the network were down
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every answer
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Whether an account has MFA enabled
    pub fn mfa_enabled(&self, username: &str) -> bool {
        self.state
            .lock()
            .accounts
            .get(username)
            .map(|a| a.mfa_enabled)
            .unwrap_or(false)
    }

    /// The stored blob for a file
    pub fn stored_blob(&self, id: FileId) -> Option<Bytes> {
        self.state.lock().files.get(&id).map(|f| f.blob.clone())
    }

    /// Flip one bit of a stored blob
    pub fn corrupt_blob(&self, id: FileId, index: usize) {
        if let Some(file) = self.state.lock().files.get_mut(&id) {
            let mut bytes = file.blob.to_vec();
            if let Some(byte) = bytes.get_mut(index) {
                *byte ^= 0x01;
            }
            file.blob = Bytes::from(bytes);
        }
    }

    /// Replace a stored blob outright
    pub fn replace_blob(&self, id: FileId, blob: impl Into<Bytes>) {
        if let Some(file) = self.state.lock().files.get_mut(&id) {
            file.blob = blob.into();
        }
    }

    /// Drop the stored key for a file and all its shares
    pub fn forget_key(&self, id: FileId) {
        let mut state = self.state.lock();
        if let Some(file) = state.files.get_mut(&id) {
            file.record.key = WireKey::default();
        }
        for share in state.shares.iter_mut().filter(|s| s.file_id == id) {
            share.key = WireKey::default();
        }
    }

    /// Number of stored shares
    pub fn share_count(&self) -> usize {
        self.state.lock().shares.len()
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(VaultError::NetworkUnavailable(
                "memory backend is offline".into(),
            ));
        }
        Ok(())
    }
}

fn random_secret() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_uppercase()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn obtain_tokens(&self, credentials: &Credentials) -> Result<TokenPair> {
        self.enter().await?;
        let mut state = self.state.lock();
        match state.accounts.get(&credentials.username) {
            Some(account) if account.password == credentials.password => {
                Ok(state.issue_tokens(&credentials.username))
            }
            _ => Err(VaultError::InvalidCredentials),
        }
    }

    async fn refresh_access(&self, refresh: &str) -> Result<String> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state
            .refresh_tokens
            .get(refresh)
            .cloned()
            .ok_or(VaultError::Unauthorized)?;
        let access = format!("access-{}", Uuid::new_v4().simple());
        state.access_tokens.insert(access.clone(), username);
        Ok(access)
    }

    async fn register(&self, registration: &Registration) -> Result<()> {
        self.enter().await?;
        let mut state = self.state.lock();
        if state.accounts.contains_key(&registration.username) {
            return Err(VaultError::ValidationError(
                "A user with that username already exists.".into(),
            ));
        }
        state.add_account(
            &registration.username,
            &registration.email,
            &registration.password,
        );
        Ok(())
    }

    async fn profile(&self, access: &str) -> Result<UserProfile> {
        self.enter().await?;
        let state = self.state.lock();
        let username = state.user_for(access)?;
        let account = state
            .accounts
            .get(&username)
            .ok_or(VaultError::Unauthorized)?;
        Ok(UserProfile {
            id: account.id,
            username,
            email: account.email.clone(),
            role: "USER".into(),
            mfa_enabled: account.mfa_enabled,
            email_verified: false,
        })
    }

    async fn mfa_setup(&self, access: &str) -> Result<MfaEnrollment> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        let account = state.account_mut(&username)?;
        if account.mfa_enabled {
            return Err(VaultError::MfaAlreadyEnabled);
        }
        let secret = random_secret();
        account.mfa_secret = Some(secret.clone());
        let uri = format!(
            "otpauth://totp/Vaultshare:{}?secret={}&issuer=Vaultshare",
            account.email, secret
        );
        Ok(MfaEnrollment {
            secret,
            qr_material: base64::engine::general_purpose::STANDARD.encode(uri),
        })
    }

    async fn mfa_confirm(&self, access: &str, code: &MfaCode) -> Result<()> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        state.check_code(&username, code, "MFA secret not generated.")?;
        state.account_mut(&username)?.mfa_enabled = true;
        Ok(())
    }

    async fn mfa_verify(&self, access: &str, code: &MfaCode) -> Result<TokenPair> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        state.check_code(&username, code, NOT_SET_UP)?;
        Ok(state.issue_tokens(&username))
    }

    async fn mfa_disable(&self, access: &str, code: &MfaCode) -> Result<()> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        state.check_code(&username, code, NOT_SET_UP)?;
        let account = state.account_mut(&username)?;
        account.mfa_enabled = false;
        account.mfa_secret = None;
        Ok(())
    }

    async fn upload(&self, access: &str, upload: FileUpload) -> Result<FileRecord> {
        self.enter().await?;
        let mut state = self.state.lock();
        let owner = state.user_for(access)?;
        if upload.name.trim().is_empty() {
            return Err(VaultError::ValidationError("name: This field may not be blank.".into()));
        }
        state.next_file_id += 1;
        let id = FileId(state.next_file_id);
        let now = Utc::now();
        let record = FileRecord {
            id,
            name: upload.name.clone(),
            owner,
            key: upload.key.clone(),
            created_at: now,
            updated_at: Some(now),
            size: upload.ciphertext.len() as u64,
            mime_type: "application/octet-stream".into(),
            download_url: Some(format!("memory://files/{}/download/", id)),
        };
        state.files.insert(
            id,
            StoredFile {
                record: record.clone(),
                blob: upload.ciphertext,
            },
        );
        Ok(record)
    }

    async fn list_files(&self, access: &str) -> Result<Vec<FileRecord>> {
        self.enter().await?;
        let state = self.state.lock();
        let username = state.user_for(access)?;
        Ok(state
            .files
            .values()
            .filter(|f| f.record.owner == username)
            .map(|f| f.record.clone())
            .collect())
    }

    async fn list_shared_with_me(&self, access: &str) -> Result<Vec<SharedFile>> {
        self.enter().await?;
        let state = self.state.lock();
        let username = state.user_for(access)?;
        Ok(state
            .shares
            .iter()
            .filter(|s| s.shared_with == username)
            .filter_map(|s| state.shared_file(s))
            .collect())
    }

    async fn shared_by_token(&self, access: &str, token: Uuid) -> Result<SharedFile> {
        self.enter().await?;
        let state = self.state.lock();
        let username = state.user_for(access)?;
        let not_found = || VaultError::NotFound("No FileShare matches the given query.".into());
        let share = state
            .shares
            .iter()
            .find(|s| s.token == token)
            .ok_or_else(not_found)?;
        if !crate::sharing::is_active(share.expires_at, Utc::now()) {
            return Err(VaultError::AccessDenied("This share link has expired.".into()));
        }
        if share.shared_with != username {
            return Err(VaultError::AccessDenied(
                "You don't have permission to access this file.".into(),
            ));
        }
        state.shared_file(share).ok_or_else(not_found)
    }

    async fn fetch(
        &self,
        access: &str,
        id: FileId,
        disposition: Disposition,
    ) -> Result<FetchedFile> {
        self.enter().await?;
        let state = self.state.lock();
        let username = state.user_for(access)?;
        let file = state
            .files
            .get(&id)
            .ok_or_else(|| VaultError::NotFound(format!("file {}", id)))?;

        let key = if file.record.owner == username {
            file.record.key.clone()
        } else {
            let share = state
                .shares
                .iter()
                .find(|s| s.file_id == id && s.shared_with == username)
                .ok_or_else(|| {
                    VaultError::AccessDenied(
                        "You don't have permission to access this file.".into(),
                    )
                })?;
            if !crate::sharing::is_active(share.expires_at, Utc::now()) {
                return Err(VaultError::AccessDenied("This share has expired.".into()));
            }
            if disposition == Disposition::Download && !share.permission.allows_download() {
                return Err(VaultError::AccessDenied(
                    "You don't have permission to download this file.".into(),
                ));
            }
            share.key.clone()
        };

        Ok(FetchedFile {
            ciphertext: file.blob.clone(),
            key: (!key.is_empty()).then_some(key),
        })
    }

    async fn share(&self, access: &str, grant: &ShareGrant) -> Result<ShareGrant> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        let file = state
            .files
            .get(&grant.file_id)
            .ok_or_else(|| VaultError::NotFound(format!("file {}", grant.file_id)))?;
        if file.record.owner != username {
            return Err(VaultError::AccessDenied(
                "Only the owner can share this file.".into(),
            ));
        }
        if !state.accounts.contains_key(&grant.recipient) {
            return Err(VaultError::RecipientNotFound(grant.recipient.clone()));
        }

        state.next_share_id += 1;
        let stored = StoredShare {
            id: ShareId(state.next_share_id),
            file_id: grant.file_id,
            shared_by: username,
            shared_with: grant.recipient.clone(),
            permission: grant.permission,
            expires_at: grant.expires_at,
            created_at: Utc::now(),
            key: grant.key.clone(),
            token: Uuid::new_v4(),
        };
        let mut saved = grant.clone();
        saved.id = Some(stored.id);
        saved.shared_by = Some(stored.shared_by.clone());
        saved.share_token = Some(stored.token);
        saved.created_at = Some(stored.created_at);
        state.shares.push(stored);
        Ok(saved)
    }

    async fn delete(&self, access: &str, id: FileId) -> Result<()> {
        self.enter().await?;
        let mut state = self.state.lock();
        let username = state.user_for(access)?;
        match state.files.get(&id) {
            None => return Err(VaultError::NotFound(format!("file {}", id))),
            Some(file) if file.record.owner != username => {
                return Err(VaultError::AccessDenied(
                    "Only the owner can delete this file.".into(),
                ))
            }
            Some(_) => {}
        }
        state.files.remove(&id);
        state.shares.retain(|s| s.file_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_and_profile() {
        let backend = MemoryBackend::new().with_user("alice", "pw");
        let tokens = backend
            .obtain_tokens(&Credentials::new("alice", "pw"))
            .await
            .unwrap();
        let profile = backend.profile(&tokens.access).await.unwrap();
        assert_eq!(profile.username, "alice");
        assert!(!profile.mfa_enabled);

        assert_eq!(
            backend
                .obtain_tokens(&Credentials::new("alice", "wrong"))
                .await
                .unwrap_err(),
            VaultError::InvalidCredentials
        );
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_token_unauthorized() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.list_files("nope").await.unwrap_err(),
            VaultError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_offline() {
        let backend = MemoryBackend::new().with_user("alice", "pw");
        backend.set_offline(true);
        assert!(matches!(
            backend.obtain_tokens(&Credentials::new("alice", "pw")).await,
            Err(VaultError::NetworkUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mfa_enrollment_flow() {
        let backend = MemoryBackend::new().with_user("alice", "pw");
        let tokens = backend
            .obtain_tokens(&Credentials::new("alice", "pw"))
            .await
            .unwrap();
        let code = MfaCode::parse("424242").unwrap();

        assert!(matches!(
            backend.mfa_verify(&tokens.access, &code).await,
            Err(VaultError::MfaRejected { .. })
        ));

        let enrollment = backend.mfa_setup(&tokens.access).await.unwrap();
        assert_eq!(enrollment.secret.len(), 16);
        backend.set_totp_code("alice", "424242");
        backend.mfa_verify(&tokens.access, &code).await.unwrap();
        assert!(!backend.mfa_enabled("alice"));

        let wrong = MfaCode::parse("000000").unwrap();
        assert!(matches!(
            backend.mfa_confirm(&tokens.access, &wrong).await,
            Err(VaultError::MfaRejected { .. })
        ));
        assert!(!backend.mfa_enabled("alice"));
        backend.mfa_confirm(&tokens.access, &code).await.unwrap();
        assert!(backend.mfa_enabled("alice"));

        assert_eq!(
            backend.mfa_setup(&tokens.access).await.unwrap_err(),
            VaultError::MfaAlreadyEnabled
        );
    }

    #[tokio::test]
    async fn test_confirm_without_secret() {
        let backend = MemoryBackend::new().with_user("alice", "pw");
        let tokens = backend
            .obtain_tokens(&Credentials::new("alice", "pw"))
            .await
            .unwrap();
        let code = MfaCode::parse("424242").unwrap();
        assert!(matches!(
            backend.mfa_confirm(&tokens.access, &code).await,
            Err(VaultError::MfaRejected { reason }) if reason == "MFA secret not generated."
        ));
    }

    async fn share_fixture(expires_at: Option<chrono::DateTime<Utc>>) -> (MemoryBackend, Uuid, String, String) {
        let backend = MemoryBackend::new()
            .with_user("alice", "pw")
            .with_user("bob", "pw")
            .with_user("carol", "pw");
        let mut access = Vec::new();
        for user in ["alice", "bob", "carol"] {
            let tokens = backend
                .obtain_tokens(&Credentials::new(user, "pw"))
                .await
                .unwrap();
            access.push(tokens.access.clone());
        }
        let key = vaultshare_crypto::SymmetricKey::generate().unwrap();
        let record = backend
            .upload(
                &access[0],
                FileUpload {
                    name: "a.txt".into(),
                    key: WireKey::from(&key),
                    ciphertext: Bytes::from_static(b"sealed"),
                },
            )
            .await
            .unwrap();
        let grant = ShareGrant {
            id: None,
            file_id: record.id,
            recipient: "bob".into(),
            permission: Permission::View,
            expires_at,
            key: WireKey::from(&key),
            shared_by: None,
            share_token: None,
            created_at: None,
        };
        let stored = backend.share(&access[0], &grant).await.unwrap();
        let token = stored.share_token.unwrap();
        (backend, token, access[1].clone(), access[2].clone())
    }

    #[tokio::test]
    async fn test_share_link_resolves_for_recipient() {
        let (backend, token, bob, _) = share_fixture(None).await;
        let shared = backend.shared_by_token(&bob, token).await.unwrap();
        assert_eq!(shared.file.name, "a.txt");
        assert_eq!(shared.shared_by, "alice");
        assert!(!shared.key.is_empty());

        assert!(matches!(
            backend.shared_by_token(&bob, Uuid::new_v4()).await,
            Err(VaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_share_link_refuses_other_users() {
        let (backend, token, _, carol) = share_fixture(None).await;
        assert_eq!(
            backend.shared_by_token(&carol, token).await.unwrap_err(),
            VaultError::AccessDenied("You don't have permission to access this file.".into())
        );
    }

    #[tokio::test]
    async fn test_expired_share_link() {
        let expired = Utc::now() - chrono::Duration::minutes(5);
        let (backend, token, bob, _) = share_fixture(Some(expired)).await;
        assert_eq!(
            backend.shared_by_token(&bob, token).await.unwrap_err(),
            VaultError::AccessDenied("This share link has expired.".into())
        );
    }
}
