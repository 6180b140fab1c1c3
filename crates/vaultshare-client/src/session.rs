//! Authentication and MFA state for one logical user session
//!
//! ```text
//!  ANONYMOUS ──login──▶ PENDING_MFA ──verify_mfa──▶ VERIFIED
//!      ▲                   │     ▲                     │
//!      │          begin_mfa_setup│verify_mfa           │
//!      │                   ▼     │                     │
//!      │               MFA_ENROLLING                   │
//!      └───────────────── logout (any state) ──────────┘
//! ```
//!
//! Transitions are serialized by an async mutex held across the backend call.
//! `logout` never waits for it: it bumps an epoch, and a transition whose epoch
//! changed while it was in flight discards its result with `Cancelled`.

use crate::backend::{with_deadline, Backend};
use crate::config::ClientConfig;
use crate::types::*;
use crate::{Result, VaultError};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// Where a session stands in the login/MFA flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// No tokens
    #[default]
    Anonymous,
    /// Password accepted, MFA code outstanding
    PendingMfa,
    /// Authenticator secret issued, first code outstanding
    MfaEnrolling,
    /// MFA code accepted; file operations allowed
    Verified,
}

impl AuthState {
    /// Whether the backend has issued tokens for this state
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Anonymous => "anonymous",
            Self::PendingMfa => "pending MFA",
            Self::MfaEnrolling => "enrolling MFA",
            Self::Verified => "verified",
        })
    }
}

#[derive(Default)]
struct SessionInner {
    state: AuthState,
    username: Option<String>,
    tokens: Option<TokenPair>,
    enrollment: Option<MfaEnrollment>,
    profile: Option<UserProfile>,
    epoch: u64,
}

impl SessionInner {
    fn require(&self, allowed: &[AuthState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(VaultError::InvalidTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn access(&self) -> Result<Zeroizing<String>> {
        self.tokens
            .as_ref()
            .map(|t| Zeroizing::new(t.access.clone()))
            .ok_or(VaultError::Unauthorized)
    }

    fn reset(&mut self) {
        self.state = AuthState::Anonymous;
        self.username = None;
        self.tokens = None;
        self.enrollment = None;
        self.profile = None;
        self.epoch += 1;
    }
}

/// A caller-owned login session.
///
/// Share it behind an `Arc` when several tasks act for the same user.
pub struct Session {
    backend: Arc<dyn Backend>,
    timeout: Duration,
    transitions: tokio::sync::Mutex<()>,
    inner: RwLock<SessionInner>,
}

impl Session {
    /// Create an anonymous session
    pub fn new(backend: Arc<dyn Backend>, config: &ClientConfig) -> Self {
        Self {
            backend,
            timeout: config.timeout,
            transitions: tokio::sync::Mutex::new(()),
            inner: RwLock::new(SessionInner::default()),
        }
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.inner.read().state
    }

    /// Whether file operations are allowed
    pub fn is_verified(&self) -> bool {
        self.state() == AuthState::Verified
    }

    /// Logged-in username
    pub fn username(&self) -> Option<String> {
        self.inner.read().username.clone()
    }

    /// Current token pair
    pub fn tokens(&self) -> Option<TokenPair> {
        self.inner.read().tokens.clone()
    }

    /// Cached account profile, if it was fetched
    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.read().profile.clone()
    }

    /// Exchange username and password for tokens
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let _transition = self.transitions.lock().await;
        let epoch = {
            let inner = self.inner.read();
            inner.require(&[AuthState::Anonymous], "log in")?;
            inner.epoch
        };

        let credentials = Credentials::new(username, password);
        debug!("requesting tokens");
        let tokens = with_deadline(self.timeout, self.backend.obtain_tokens(&credentials)).await?;

        self.commit(epoch, |inner| {
            inner.state = AuthState::PendingMfa;
            inner.username = Some(username.to_string());
            inner.tokens = Some(tokens);
        })?;
        info!("logged in, MFA pending");
        Ok(())
    }

    /// Ask the backend for a fresh authenticator secret.
    ///
    /// Re-issuing replaces an unverified secret.
    #[instrument(skip(self))]
    pub async fn begin_mfa_setup(&self) -> Result<MfaEnrollment> {
        let _transition = self.transitions.lock().await;
        let (epoch, access, cached) = {
            let inner = self.inner.read();
            inner.require(
                &[AuthState::PendingMfa, AuthState::MfaEnrolling],
                "begin MFA setup",
            )?;
            (inner.epoch, inner.access()?, inner.profile.clone())
        };

        let profile = match cached {
            Some(profile) => profile,
            None => {
                let profile = self.mfa_step(epoch, self.backend.profile(&access)).await?;
                let stored = profile.clone();
                self.commit(epoch, |inner| inner.profile = Some(stored))?;
                profile
            }
        };
        if profile.mfa_enabled {
            return Err(VaultError::MfaAlreadyEnabled);
        }

        let enrollment = self.mfa_step(epoch, self.backend.mfa_setup(&access)).await?;
        let stored = enrollment.clone();
        self.commit(epoch, |inner| {
            inner.state = AuthState::MfaEnrolling;
            inner.enrollment = Some(stored);
        })?;
        info!("MFA enrollment started");
        Ok(enrollment)
    }

    /// Submit a six digit code.
    ///
    /// While enrolling, the code first confirms the new authenticator so the
    /// account has MFA enabled before the session is verified. On rejection the
    /// state is unchanged and the caller may try again.
    #[instrument(skip(self, code))]
    pub async fn verify_mfa(&self, code: &str) -> Result<()> {
        let _transition = self.transitions.lock().await;
        let (epoch, access, state) = {
            let inner = self.inner.read();
            inner.require(
                &[AuthState::PendingMfa, AuthState::MfaEnrolling],
                "verify MFA",
            )?;
            (inner.epoch, inner.access()?, inner.state)
        };
        let code = MfaCode::parse(code)?;

        if state == AuthState::MfaEnrolling {
            self.mfa_step(epoch, self.backend.mfa_confirm(&access, &code))
                .await
                .inspect_err(log_rejection)?;
            self.commit(epoch, |inner| {
                if let Some(profile) = inner.profile.as_mut() {
                    profile.mfa_enabled = true;
                }
            })?;
            info!("MFA enabled for the account");
        }

        let tokens = self
            .mfa_step(epoch, self.backend.mfa_verify(&access, &code))
            .await
            .inspect_err(log_rejection)?;

        self.commit(epoch, |inner| {
            inner.state = AuthState::Verified;
            inner.tokens = Some(tokens);
            inner.enrollment = None;
        })?;
        info!("MFA verified");
        Ok(())
    }

    /// Replace the access token using the refresh token
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let _transition = self.transitions.lock().await;
        let (epoch, refresh) = {
            let inner = self.inner.read();
            if !inner.state.is_authenticated() {
                return Err(VaultError::InvalidTransition {
                    state: inner.state,
                    operation: "refresh tokens",
                });
            }
            let refresh = inner
                .tokens
                .as_ref()
                .map(|t| Zeroizing::new(t.refresh.clone()))
                .ok_or(VaultError::Unauthorized)?;
            (inner.epoch, refresh)
        };

        let access = self.mfa_step(epoch, self.backend.refresh_access(&refresh)).await?;
        self.commit(epoch, |inner| {
            if let Some(tokens) = inner.tokens.as_mut() {
                tokens.access = access;
            }
        })?;
        debug!("access token refreshed");
        Ok(())
    }

    /// Create an account. Does not log in.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        with_deadline(self.timeout, self.backend.register(registration)).await?;
        info!("account registered");
        Ok(())
    }

    /// Turn MFA off for the account. The session stays verified.
    #[instrument(skip(self, code))]
    pub async fn disable_mfa(&self, code: &str) -> Result<()> {
        let _transition = self.transitions.lock().await;
        let (epoch, access) = {
            let inner = self.inner.read();
            inner.require(&[AuthState::Verified], "disable MFA")?;
            (inner.epoch, inner.access()?)
        };
        let code = MfaCode::parse(code)?;

        with_deadline(self.timeout, self.backend.mfa_disable(&access, &code)).await?;
        self.commit(epoch, |inner| {
            if let Some(profile) = inner.profile.as_mut() {
                profile.mfa_enabled = false;
            }
        })?;
        info!("MFA disabled");
        Ok(())
    }

    /// Drop all tokens and any pending secret
    pub fn logout(&self) {
        let previous = {
            let mut inner = self.inner.write();
            let previous = inner.state;
            inner.reset();
            previous
        };
        info!(from = %previous, "logged out");
    }

    /// Access token for file operations
    pub(crate) fn verified_access(&self) -> Result<Zeroizing<String>> {
        let inner = self.inner.read();
        if inner.state != AuthState::Verified {
            return Err(VaultError::SessionNotVerified);
        }
        inner.access()
    }

    async fn mfa_step<T, F>(&self, epoch: u64, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match with_deadline(self.timeout, call).await {
            Err(VaultError::Unauthorized) => {
                let mut inner = self.inner.write();
                if inner.epoch == epoch {
                    warn!("tokens rejected, session reset");
                    inner.reset();
                }
                Err(VaultError::Unauthorized)
            }
            other => other,
        }
    }

    fn commit<T>(&self, epoch: u64, apply: impl FnOnce(&mut SessionInner) -> T) -> Result<T> {
        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            warn!("session changed during the call, result discarded");
            return Err(VaultError::Cancelled);
        }
        Ok(apply(&mut inner))
    }
}

fn log_rejection(err: &VaultError) {
    if let VaultError::MfaRejected { .. } = err {
        warn!(error = %err, "MFA code rejected");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Session")
            .field("state", &inner.state)
            .field("username", &inner.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
