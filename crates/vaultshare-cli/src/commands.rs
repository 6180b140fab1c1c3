//! Subcommands and their execution

use crate::config::CliConfig;
use anyhow::{bail, Context};
use chrono::Utc;
use clap::Subcommand;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use vaultshare_client::{
    Backend, FileId, Registration, Session, ShareParams, VaultService,
};

/// What to do once connected
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account with the configured username and password
    Register {
        /// Email address for the account
        #[arg(long)]
        email: String,
    },
    /// Enroll an authenticator app; verifies it too when a code is given
    MfaSetup,
    /// Encrypt a local file and upload it
    Upload {
        /// File to upload
        path: PathBuf,
        /// Name to store it under (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// List your files
    List,
    /// List files shared with you
    Shared,
    /// Download and decrypt a file
    Download {
        id: FileId,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Decrypt a file for display
    View { id: FileId },
    /// Share one of your files
    Share {
        id: FileId,
        /// Recipient username
        recipient: String,
        /// VIEW or DOWNLOAD
        #[arg(long, default_value = "VIEW")]
        permission: String,
        /// Expire the share after this many hours
        #[arg(long)]
        expires_in_hours: Option<i64>,
    },
    /// Delete one of your files
    Delete { id: FileId },
}

/// Runs commands for one user against one backend
pub struct Runner {
    config: CliConfig,
    session: Session,
    vault: VaultService,
}

impl Runner {
    /// Create a runner
    pub fn new(config: CliConfig, backend: Arc<dyn Backend>) -> Self {
        let client = config.client_config();
        Self {
            session: Session::new(backend.clone(), &client),
            vault: VaultService::new(backend, &client),
            config,
        }
    }

    /// Run `command`, writing user-facing output to `out`
    pub async fn run<W: Write>(&self, command: Command, out: &mut W) -> anyhow::Result<()> {
        debug!(?command, "running");
        let result = match command {
            Command::Register { email } => self.register(email, out).await,
            Command::MfaSetup => self.mfa_setup(out).await,
            command => match self.sign_in().await {
                Ok(()) => self.execute(command, out).await,
                Err(e) => Err(e),
            },
        };
        self.session.logout();
        result
    }

    async fn register<W: Write>(&self, email: String, out: &mut W) -> anyhow::Result<()> {
        let (username, password) = self.config.credentials()?;
        let registration = Registration {
            username: username.to_string(),
            email,
            password: password.to_string(),
            password2: password.to_string(),
        };
        self.session
            .register(&registration)
            .await
            .context("registration failed")?;
        writeln!(out, "Registered {}", username)?;
        Ok(())
    }

    async fn mfa_setup<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let (username, password) = self.config.credentials()?;
        self.session
            .login(username, password)
            .await
            .context("login failed")?;
        let enrollment = self
            .session
            .begin_mfa_setup()
            .await
            .context("MFA setup failed")?;
        writeln!(out, "Secret:  {}", enrollment.secret)?;
        writeln!(out, "QR code: {}", enrollment.qr_material)?;

        match self.config.mfa_code.as_deref() {
            Some(code) => {
                self.session
                    .verify_mfa(code)
                    .await
                    .context("MFA verification failed")?;
                writeln!(out, "MFA enabled")?;
            }
            None => writeln!(
                out,
                "Add the secret to your authenticator, then run again with --mfa-code"
            )?,
        }
        Ok(())
    }

    async fn sign_in(&self) -> anyhow::Result<()> {
        let (username, password) = self.config.credentials()?;
        let Some(code) = self.config.mfa_code.as_deref() else {
            bail!("MFA code required (--mfa-code or VAULTSHARE_MFA_CODE)");
        };
        self.session
            .login(username, password)
            .await
            .context("login failed")?;
        self.session
            .verify_mfa(code)
            .await
            .context("MFA verification failed")?;
        info!(username, "signed in");
        Ok(())
    }

    async fn execute<W: Write>(&self, command: Command, out: &mut W) -> anyhow::Result<()> {
        let session = &self.session;
        match command {
            Command::Upload { path, name } => {
                let name = match name {
                    Some(name) => name,
                    None => match path.file_name() {
                        Some(name) => name.to_string_lossy().into_owned(),
                        None => bail!("cannot derive a name from {}", path.display()),
                    },
                };
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let record = self.vault.upload(session, &data, &name).await?;
                writeln!(out, "Uploaded {} as file {} ({} bytes stored)", record.name, record.id, record.size)?;
            }
            Command::List => {
                let files = self.vault.list_files(session).await?;
                writeln!(out, "{:>6}  {:<32}  {:>10}  CREATED", "ID", "NAME", "SIZE")?;
                for file in files {
                    writeln!(
                        out,
                        "{:>6}  {:<32}  {:>10}  {}",
                        file.id,
                        file.name,
                        file.size,
                        file.created_at.format("%Y-%m-%d %H:%M")
                    )?;
                }
            }
            Command::Shared => {
                let now = Utc::now();
                let shared = self.vault.list_shared_with_me(session).await?;
                writeln!(
                    out,
                    "{:>6}  {:<32}  {:<12}  {:<14}  PERMISSION",
                    "ID", "NAME", "SHARED BY", "STATUS"
                )?;
                for entry in shared {
                    let display = entry.display(now);
                    writeln!(
                        out,
                        "{:>6}  {:<32}  {:<12}  {:<14}  {}",
                        entry.file.id,
                        entry.file.name,
                        entry.shared_by,
                        display.status.to_string(),
                        display.permission
                    )?;
                }
            }
            Command::Download { id, out: path } => {
                let plaintext = self.vault.download(session, id).await?;
                match path {
                    Some(path) => {
                        tokio::fs::write(&path, &plaintext)
                            .await
                            .with_context(|| format!("writing {}", path.display()))?;
                        writeln!(out, "Wrote {} bytes to {}", plaintext.len(), path.display())?;
                    }
                    None => out.write_all(&plaintext)?,
                }
            }
            Command::View { id } => {
                let plaintext = self.vault.view(session, id).await?;
                writeln!(out, "{}", String::from_utf8_lossy(&plaintext))?;
            }
            Command::Share {
                id,
                recipient,
                permission,
                expires_in_hours,
            } => {
                let files = self.vault.list_files(session).await?;
                let Some(file) = files.iter().find(|f| f.id == id) else {
                    bail!("file {} is not one of your files", id);
                };
                let mut params = ShareParams::new(recipient, permission);
                if let Some(hours) = expires_in_hours {
                    params = params.with_expiry(Utc::now() + chrono::Duration::hours(hours));
                }
                let grant = self.vault.share(session, file, params).await?;
                writeln!(
                    out,
                    "Shared {} with {} ({})",
                    file.name, grant.recipient, grant.permission
                )?;
                if let Some(expires_at) = grant.expires_at {
                    writeln!(out, "Expires: {}", expires_at.to_rfc3339())?;
                }
                if let Some(token) = grant.share_token {
                    writeln!(out, "Token:   {}", token)?;
                }
            }
            Command::Delete { id } => {
                self.vault.delete(session, id).await?;
                writeln!(out, "Deleted file {}", id)?;
            }
            Command::Register { .. } | Command::MfaSetup => {
                bail!("command does not need a verified session")
            }
        }
        Ok(())
    }
}
