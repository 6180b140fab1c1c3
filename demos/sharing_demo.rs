//! Walkthrough of the encrypt-before-upload flow against an in-memory backend
//!
//! This demo shows:
//! 1. Logging in and verifying an MFA code
//! 2. Uploading a file that is sealed locally first
//! 3. Sharing it view-only with an expiry
//! 4. What the recipient can and cannot do
//!
//! Run with: cargo run --example sharing_demo

use std::sync::Arc;
use vaultshare_client::{
    ClientConfig, MemoryBackend, Permission, Session, ShareParams, VaultError, VaultService,
};

const PASSWORD: &str = "Secret123!@#";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("===========================================");
    println!("   Vaultshare Sharing Demo");
    println!("===========================================\n");

    let backend = MemoryBackend::new()
        .with_mfa_user("alice", PASSWORD, "111111")
        .with_mfa_user("bob", PASSWORD, "222222");
    let config = ClientConfig::default();
    let vault = VaultService::new(Arc::new(backend.clone()), &config);

    let alice = Session::new(Arc::new(backend.clone()), &config);
    alice.login("alice", PASSWORD).await?;
    println!("👤 alice logged in: {}", alice.state());
    alice.verify_mfa("111111").await?;
    println!("   MFA verified: {}\n", alice.state());

    let content = b"Quarterly numbers: up and to the right";
    let record = vault.upload(&alice, content, "report.txt").await?;
    let stored = backend.stored_blob(record.id).unwrap_or_default();
    println!("📤 Uploaded {} as file {}", record.name, record.id);
    println!("   Plaintext: {} bytes, stored blob: {} bytes", content.len(), stored.len());
    println!("   Stored blob starts with nonce {:02x?}\n", &stored[..stored.len().min(12)]);

    let expires = chrono::Utc::now() + chrono::Duration::hours(24);
    let grant = vault
        .share(
            &alice,
            &record,
            ShareParams::new("bob", Permission::View).with_expiry(expires),
        )
        .await?;
    println!("🔗 Shared with {} as {}", grant.recipient, grant.permission);
    if let Some(token) = grant.share_token {
        println!("   Share token: {}", token);
    }
    println!("   Expires: {}\n", expires.to_rfc3339());

    let bob = Session::new(Arc::new(backend.clone()), &config);
    bob.login("bob", PASSWORD).await?;
    bob.verify_mfa("222222").await?;

    for shared in vault.list_shared_with_me(&bob).await? {
        let display = shared.display(chrono::Utc::now());
        println!(
            "📬 bob sees {} from {}: {} / {}",
            shared.file.name, shared.shared_by, display.status, display.permission
        );
    }

    let viewed = vault.view(&bob, record.id).await?;
    println!("   View: \"{}\"", String::from_utf8_lossy(&viewed));
    match vault.download(&bob, record.id).await {
        Err(VaultError::AccessDenied(reason)) => println!("   Download refused: {}", reason),
        other => println!("   Unexpected download result: {:?}", other.map(|b| b.len())),
    }

    alice.logout();
    match vault.list_files(&alice).await {
        Err(e) => println!("\n🚪 alice logged out; listing now fails: {}", e),
        Ok(files) => println!("\n🚪 unexpected listing of {} files", files.len()),
    }

    println!("\n✅ Demo completed");
    Ok(())
}
