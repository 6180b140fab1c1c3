//! End-to-end tests for the Vaultshare client
//!
//! These drive the session and vault service together against the in-memory
//! backend, which enforces the same ownership, expiry and permission rules as
//! the real service.

use chrono::{Duration, Utc};
use std::sync::Arc;
use test_log::test;
use vaultshare_client::{
    AuthState, ClientConfig, FileId, MemoryBackend, Permission, Session, ShareParams,
    ShareStatus, VaultError, VaultService,
};

const PASSWORD: &str = "Secret123!@#";

fn backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_user("alice", PASSWORD)
        .with_mfa_user("bob", PASSWORD, "222222")
}

fn session(backend: &MemoryBackend) -> Session {
    Session::new(Arc::new(backend.clone()), &ClientConfig::default())
}

fn vault(backend: &MemoryBackend) -> VaultService {
    VaultService::new(Arc::new(backend.clone()), &ClientConfig::default())
}

/// Enroll alice in MFA and return a verified session
async fn enrolled_alice(backend: &MemoryBackend) -> Session {
    let alice = session(backend);
    alice.login("alice", PASSWORD).await.unwrap();
    let enrollment = alice.begin_mfa_setup().await.unwrap();
    assert!(!enrollment.secret.is_empty());
    assert!(!enrollment.qr_material.is_empty());
    backend.set_totp_code("alice", "111111");
    alice.verify_mfa("111111").await.unwrap();
    assert!(backend.mfa_enabled("alice"));
    alice
}

async fn verified_bob(backend: &MemoryBackend) -> Session {
    let bob = session(backend);
    bob.login("bob", PASSWORD).await.unwrap();
    bob.verify_mfa("222222").await.unwrap();
    bob
}

/// Login, then a well-formed code against an unenrolled account
#[test(tokio::test)]
async fn test_scenario_a_rejected_code_keeps_pending_state() {
    let backend = backend();
    let alice = session(&backend);

    alice.login("alice", PASSWORD).await.unwrap();
    assert_eq!(alice.state(), AuthState::PendingMfa);

    let err = alice.verify_mfa("000000").await.unwrap_err();
    assert_ne!(err, VaultError::InvalidCodeFormat);
    assert!(matches!(err, VaultError::MfaRejected { .. }));
    assert_eq!(alice.state(), AuthState::PendingMfa);

    // the caller may retry after enrolling
    alice.begin_mfa_setup().await.unwrap();
    backend.set_totp_code("alice", "000000");
    alice.verify_mfa("000000").await.unwrap();
    assert_eq!(alice.state(), AuthState::Verified);
}

/// Upload, then download reproduces the exact bytes
#[test(tokio::test)]
async fn test_scenario_b_upload_download_roundtrip() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;
    assert_eq!(alice.state(), AuthState::Verified);

    let record = vault.upload(&alice, b"hello world", "a.txt").await.unwrap();
    assert_eq!(record.name, "a.txt");
    assert_eq!(vault.download(&alice, record.id).await.unwrap(), b"hello world");
}

/// Sharing with an expiry in the past is refused locally
#[test(tokio::test)]
async fn test_scenario_c_past_expiry_is_validation_error() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;
    let record = vault.upload(&alice, b"hello world", "a.txt").await.unwrap();
    let calls = backend.calls();

    let params = ShareParams::new("bob", "VIEW").with_expiry(Utc::now() - Duration::seconds(1));
    assert!(matches!(
        vault.share(&alice, &record, params).await,
        Err(VaultError::ValidationError(_))
    ));
    assert_eq!(backend.calls(), calls);
    assert_eq!(backend.share_count(), 0);
}

#[test(tokio::test)]
async fn test_recipient_download_share() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;
    let bob = verified_bob(&backend).await;

    let content: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
    let record = vault.upload(&alice, &content, "data.bin").await.unwrap();
    let params = ShareParams::new("bob", Permission::Download)
        .with_expiry(Utc::now() + Duration::days(7));
    vault.share(&alice, &record, params).await.unwrap();

    assert_eq!(vault.download(&bob, record.id).await.unwrap(), content);
    assert_eq!(vault.view(&bob, record.id).await.unwrap(), content);

    let shared = vault.list_shared_with_me(&bob).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].shared_by, "alice");
    assert_eq!(shared[0].file.id, record.id);
    assert_eq!(shared[0].display(Utc::now()).status, ShareStatus::Active);

    // seen from a week later, the same share reads as expired
    let later = Utc::now() + Duration::days(8);
    assert!(!shared[0].is_active(later));
    assert_eq!(shared[0].display(later).status, ShareStatus::Expired);
}

#[test(tokio::test)]
async fn test_files_are_private_until_shared() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;
    let bob = verified_bob(&backend).await;

    let record = vault.upload(&alice, b"secret", "s.txt").await.unwrap();
    assert!(vault.list_files(&bob).await.unwrap().is_empty());
    assert!(vault.list_shared_with_me(&bob).await.unwrap().is_empty());
    assert!(matches!(
        vault.view(&bob, record.id).await,
        Err(VaultError::AccessDenied(_))
    ));

    vault
        .share(&alice, &record, ShareParams::new("bob", "VIEW"))
        .await
        .unwrap();
    assert_eq!(vault.view(&bob, record.id).await.unwrap(), b"secret");
}

#[test(tokio::test)]
async fn test_logout_blocks_file_operations() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;
    let record = vault.upload(&alice, b"x", "x").await.unwrap();

    alice.logout();
    assert_eq!(alice.state(), AuthState::Anonymous);
    let calls = backend.calls();
    assert_eq!(
        vault.download(&alice, record.id).await.unwrap_err(),
        VaultError::SessionNotVerified
    );
    assert_eq!(
        vault.list_files(&alice).await.unwrap_err(),
        VaultError::SessionNotVerified
    );
    assert_eq!(backend.calls(), calls);
}

#[test(tokio::test)]
async fn test_parallel_uploads_and_downloads() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = Arc::new(enrolled_alice(&backend).await);

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let vault = vault.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            let content = vec![i; 1024 * (i as usize + 1)];
            let record = vault.upload(&alice, &content, &format!("f{}", i)).await?;
            let back = vault.download(&alice, record.id).await?;
            Ok::<_, VaultError>((content, back))
        }));
    }
    for handle in handles {
        let (sent, got) = handle.await.unwrap().unwrap();
        assert_eq!(sent, got);
    }
    assert_eq!(vault.list_files(&alice).await.unwrap().len(), 16);
}

#[test(tokio::test)]
async fn test_unknown_file() {
    let backend = backend();
    let vault = vault(&backend);
    let alice = enrolled_alice(&backend).await;

    assert!(matches!(
        vault.download(&alice, FileId(42)).await,
        Err(VaultError::NotFound(_))
    ));
}
