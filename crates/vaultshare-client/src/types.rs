//! Common types for the client SDK

use crate::{Result, VaultError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vaultshare_crypto::SymmetricKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque identifier the backend assigns to a stored file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse()
            .map(FileId)
            .map_err(|_| VaultError::ValidationError(format!("invalid file id: {:?}", s)))
    }
}

/// Identifier the backend assigns to a stored share
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub u64);

/// A file key in its transport form: 64 hex characters.
///
/// The backend stores keys verbatim, so what comes back may be empty or
/// corrupt; decoding happens only when the key is needed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct WireKey(String);

impl WireKey {
    /// Wrap key text exactly as received
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Decode into key material, failing with `MalformedKey`
    pub fn decode(&self) -> Result<SymmetricKey> {
        Ok(SymmetricKey::from_hex(&self.0)?)
    }

    /// The raw text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the backend delivered no key at all
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&SymmetricKey> for WireKey {
    fn from(key: &SymmetricKey) -> Self {
        Self(key.to_hex())
    }
}

impl fmt::Debug for WireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WireKey(<redacted>)")
    }
}

/// A stored, encrypted file. Immutable once uploaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Backend identifier
    pub id: FileId,
    /// Display name
    pub name: String,
    /// Owner username
    pub owner: String,
    /// Key needed to decrypt the stored blob
    #[serde(rename = "encrypted_key", default)]
    pub key: WireKey,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Last metadata change
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Size of the stored blob in bytes
    pub size: u64,
    /// Content type recorded by the backend
    #[serde(default)]
    pub mime_type: String,
    /// Absolute download URL, when the backend provides one
    #[serde(default)]
    pub download_url: Option<String>,
}

/// What a share allows the recipient to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    /// Decrypt for display
    View,
    /// Decrypt and keep the plaintext
    Download,
}

impl Permission {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Download => "DOWNLOAD",
        }
    }

    /// Whether this permission lets the recipient persist plaintext
    pub fn allows_download(&self) -> bool {
        matches!(self, Self::Download)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("VIEW") {
            Ok(Self::View)
        } else if s.eq_ignore_ascii_case("DOWNLOAD") {
            Ok(Self::Download)
        } else {
            Err(VaultError::ValidationError(format!(
                "permission must be VIEW or DOWNLOAD, got {:?}",
                s
            )))
        }
    }
}

/// Whether the backend should serve a file for download or inline viewing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Attachment; requires ownership or a DOWNLOAD share
    Download,
    /// Inline; any active share suffices
    View,
}

impl Disposition {
    /// Value of the `download` query parameter
    pub fn query_value(&self) -> &'static str {
        match self {
            Self::Download => "true",
            Self::View => "false",
        }
    }
}

/// Access and refresh tokens issued by the backend
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct TokenPair {
    /// Bearer token for API calls
    pub access: String,
    /// Token used to obtain a new access token
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPair(<redacted>)")
    }
}

/// Login credentials
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// New account details
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Confirmation; must equal `password`
    pub password2: String,
}

impl Registration {
    /// Check required fields and password confirmation
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(VaultError::ValidationError("username is required".into()));
        }
        if self.email.trim().is_empty() {
            return Err(VaultError::ValidationError("email is required".into()));
        }
        if self.password.is_empty() {
            return Err(VaultError::ValidationError("password is required".into()));
        }
        if self.password != self.password2 {
            return Err(VaultError::ValidationError(
                "password fields didn't match".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Account details served by `GET /users/me/`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub mfa_enabled: bool,
    #[serde(default)]
    pub email_verified: bool,
}

/// A six digit time-based one-time code
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MfaCode(String);

impl MfaCode {
    /// Number of digits in a code
    pub const LEN: usize = 6;

    /// Validate the code format locally: exactly six ASCII digits, nothing else
    pub fn parse(input: &str) -> Result<Self> {
        if input.len() != Self::LEN || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VaultError::InvalidCodeFormat);
        }
        Ok(Self(input.to_string()))
    }

    /// The digits
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MfaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MfaCode(******)")
    }
}

/// Secret and QR payload for enrolling an authenticator app
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MfaEnrollment {
    /// Base32 TOTP secret
    pub secret: String,
    /// Base64 PNG of the provisioning QR code
    #[serde(rename = "qr_code")]
    pub qr_material: String,
}

impl fmt::Debug for MfaEnrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfaEnrollment")
            .field("secret", &"<redacted>")
            .field("qr_material_len", &self.qr_material.len())
            .finish()
    }
}

/// Payload for `POST /files/upload/`
#[derive(Clone, Debug)]
pub struct FileUpload {
    /// Display name
    pub name: String,
    /// Key the blob was sealed with
    pub key: WireKey,
    /// Sealed blob
    pub ciphertext: Bytes,
}

/// Ciphertext fetched for a file, with the key served alongside it
#[derive(Clone, Debug)]
pub struct FetchedFile {
    /// Sealed blob
    pub ciphertext: Bytes,
    /// Key, when the backend delivered one
    pub key: Option<WireKey>,
}
