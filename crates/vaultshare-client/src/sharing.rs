//! Share grants: validation, expiry, and listing state
//!
//! A grant hands a recipient a copy of a file's key under a permission and an
//! optional expiry. Once a grant's expiry passes it stays expired; nothing here
//! stores any state beyond the expiry itself.

use crate::types::{FileId, FileRecord, Permission, ShareId, WireKey};
use crate::{Result, VaultError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use vaultshare_crypto::SymmetricKey;

/// Caller-supplied parameters for sharing a file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareParams {
    /// Username of the recipient
    pub recipient: String,
    /// `VIEW` or `DOWNLOAD`
    pub permission: String,
    /// Optional expiry; must lie strictly in the future
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareParams {
    /// Share without expiry
    pub fn new(recipient: impl Into<String>, permission: impl ToString) -> Self {
        Self {
            recipient: recipient.into(),
            permission: permission.to_string(),
            expires_at: None,
        }
    }

    /// Set an expiry
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check recipient, permission and expiry; returns the trimmed recipient
    /// and parsed permission
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(&str, Permission)> {
        let recipient = self.recipient.trim();
        if recipient.is_empty() {
            return Err(VaultError::ValidationError("recipient is required".into()));
        }
        let permission: Permission = self.permission.parse()?;
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(VaultError::ValidationError(format!(
                    "expiry {} is not in the future",
                    expires_at.to_rfc3339()
                )));
            }
        }
        Ok((recipient, permission))
    }
}

/// A sharing record for one file and one recipient
#[derive(Clone, Debug, PartialEq)]
pub struct ShareGrant {
    /// Backend identifier, once stored
    pub id: Option<ShareId>,
    /// The shared file
    pub file_id: FileId,
    /// Recipient username
    pub recipient: String,
    /// What the recipient may do
    pub permission: Permission,
    /// `None` means the grant never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Copy of the file key handed to the recipient
    pub key: WireKey,
    /// Owner username, once stored
    pub shared_by: Option<String>,
    /// Backend share token, once stored
    pub share_token: Option<Uuid>,
    /// Creation time, once stored
    pub created_at: Option<DateTime<Utc>>,
}

impl ShareGrant {
    /// Build and validate a grant locally.
    ///
    /// Does not check that the recipient exists; the backend answers that.
    pub fn create(
        file: &FileRecord,
        params: &ShareParams,
        key_for_recipient: &SymmetricKey,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let (recipient, permission) = params.validate(now)?;
        Ok(Self {
            id: None,
            file_id: file.id,
            recipient: recipient.to_string(),
            permission,
            expires_at: params.expires_at,
            key: WireKey::from(key_for_recipient),
            shared_by: None,
            share_token: None,
            created_at: None,
        })
    }

    /// Whether the grant is usable at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        is_active(self.expires_at, now)
    }

    /// Listing state at `now`
    pub fn display(&self, now: DateTime<Utc>) -> ShareDisplay {
        ShareDisplay::derive(self.expires_at, self.permission, now)
    }
}

/// `true` when there is no expiry or `now` is before it
pub fn is_active(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        None => true,
        Some(expiry) => now < expiry,
    }
}

/// Expiry state shown when listing shares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShareStatus {
    /// Has an expiry that has not passed
    Active,
    /// Has no expiry
    NeverExpires,
    /// Expiry has passed
    Expired,
}

impl ShareStatus {
    /// Human label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::NeverExpires => "Never Expires",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for ShareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status and permission of a share, derived on demand
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShareDisplay {
    pub status: ShareStatus,
    pub permission: Permission,
}

impl ShareDisplay {
    /// Derive from expiry and permission
    pub fn derive(
        expires_at: Option<DateTime<Utc>>,
        permission: Permission,
        now: DateTime<Utc>,
    ) -> Self {
        let status = match expires_at {
            None => ShareStatus::NeverExpires,
            Some(_) if is_active(expires_at, now) => ShareStatus::Active,
            Some(_) => ShareStatus::Expired,
        };
        Self { status, permission }
    }

    /// Whether the recipient can currently view the file
    pub fn can_view(&self) -> bool {
        self.status != ShareStatus::Expired
    }

    /// Whether the recipient can currently download the file
    pub fn can_download(&self) -> bool {
        self.can_view() && self.permission.allows_download()
    }
}

/// A file shared with the current user, as listed by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedFile {
    /// Share identifier
    pub id: ShareId,
    /// The shared file
    pub file: FileRecord,
    /// Owner username
    pub shared_by: String,
    pub permission: Permission,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Key copy carried by the share
    #[serde(rename = "encrypted_key", default)]
    pub key: WireKey,
}

impl SharedFile {
    /// Whether the share is usable at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        is_active(self.expires_at, now)
    }

    /// Listing state at `now`
    pub fn display(&self, now: DateTime<Utc>) -> ShareDisplay {
        ShareDisplay::derive(self.expires_at, self.permission, now)
    }
}
