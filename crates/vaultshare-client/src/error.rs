//! Client error types

use crate::session::AuthState;
use crate::types::FileId;
use thiserror::Error;
use vaultshare_crypto::CryptoError;

/// Result type alias
pub type Result<T> = std::result::Result<T, VaultError>;

/// Client errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Username/password rejected by the backend
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Backend unreachable or the call exceeded its deadline
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// MFA code is not exactly six ASCII digits
    #[error("MFA code must be exactly 6 digits")]
    InvalidCodeFormat,

    /// File or share operation attempted before MFA verification
    #[error("session is not MFA-verified")]
    SessionNotVerified,

    /// Key text is not a 64 character hex string
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Blob shorter than a nonce
    #[error("malformed blob: {len} bytes is shorter than the {min} byte nonce")]
    MalformedBlob { len: usize, min: usize },

    /// AEAD tag mismatch
    #[error("authentication failure: ciphertext did not verify")]
    AuthenticationFailure,

    /// Bad request parameters, detected locally or reported by the backend
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Share recipient does not exist
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    /// Operation is not valid in the current session state
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        state: AuthState,
        operation: &'static str,
    },

    /// Backend refused an MFA code
    #[error("MFA code rejected: {reason}")]
    MfaRejected { reason: String },

    /// MFA is already provisioned for this account
    #[error("MFA is already enabled")]
    MfaAlreadyEnabled,

    /// Backend served ciphertext without a usable key
    #[error("no decryption key available for file {0}")]
    KeyUnavailable(FileId),

    /// Backend refused access to the resource
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Access token expired or was revoked
    #[error("unauthorized: access token rejected")]
    Unauthorized,

    /// A transition was superseded by a concurrent logout
    #[error("operation cancelled by logout")]
    Cancelled,

    /// Any other backend rejection, propagated unchanged
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Backend response could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local cryptographic failure other than verification
    #[error("crypto failure: {0}")]
    Crypto(String),
}

/// Coarse classification of a [`VaultError`] for caller decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix the input and try again
    InvalidInput,
    /// Try again later with the same input
    Retryable,
    /// Cryptographic verification failed; never retry with the same inputs
    Security,
    /// The backend refused the request
    Rejected,
    /// Local or protocol failure
    Internal,
}

impl VaultError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCodeFormat
            | Self::MalformedKey(_)
            | Self::ValidationError(_)
            | Self::RecipientNotFound(_)
            | Self::InvalidCredentials
            | Self::MfaRejected { .. } => ErrorCategory::InvalidInput,
            Self::NetworkUnavailable(_) => ErrorCategory::Retryable,
            Self::AuthenticationFailure | Self::MalformedBlob { .. } => ErrorCategory::Security,
            Self::SessionNotVerified
            | Self::InvalidTransition { .. }
            | Self::MfaAlreadyEnabled
            | Self::KeyUnavailable(_)
            | Self::AccessDenied(_)
            | Self::NotFound(_)
            | Self::Unauthorized
            | Self::Cancelled
            | Self::Backend { .. } => ErrorCategory::Rejected,
            Self::InvalidResponse(_) | Self::Crypto(_) => ErrorCategory::Internal,
        }
    }

    /// Only transport failures are worth retrying unchanged
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Retryable
    }

    /// Check if this is a cryptographic verification failure
    pub fn is_security_failure(&self) -> bool {
        self.category() == ErrorCategory::Security
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedKey(msg) => Self::MalformedKey(msg),
            CryptoError::MalformedBlob { len, min } => Self::MalformedBlob { len, min },
            CryptoError::AuthenticationFailure => Self::AuthenticationFailure,
            CryptoError::Entropy(msg) | CryptoError::Encryption(msg) => Self::Crypto(msg),
        }
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VaultError::InvalidResponse(err.to_string())
        } else {
            VaultError::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for VaultError {
    fn from(err: url::ParseError) -> Self {
        VaultError::ValidationError(format!("invalid endpoint: {}", err))
    }
}
