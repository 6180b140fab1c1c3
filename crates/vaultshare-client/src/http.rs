//! Backend over the REST API

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::sharing::{ShareGrant, SharedFile};
use crate::types::*;
use crate::{Result, VaultError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

/// Content type of every uploaded blob
const SEALED_MIME: &str = "application/octet-stream";

/// Which call a response belongs to, for mapping error statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Token,
    MfaSetup,
    MfaCode,
    Share,
    Other,
}

/// Backend that talks HTTP to the vault service
#[derive(Clone, Debug)]
pub struct HttpBackend {
    base: Url,
    http: Client,
}

impl HttpBackend {
    /// Create a backend for `config.endpoint`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url())?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| VaultError::ValidationError(format!("http client: {}", e)))?;
        Ok(Self { base, http })
    }

    /// API base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn send(&self, call: Call, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for(call, status, &body))
    }

    async fn json<T: for<'de> Deserialize<'de>>(&self, call: Call, request: RequestBuilder) -> Result<T> {
        let response = self.send(call, request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Serialize)]
struct CodeRequest<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct ShareRequest<'a> {
    file: FileId,
    shared_with_username: &'a str,
    permission: Permission,
    expires_at: Option<DateTime<Utc>>,
    encrypted_key: &'a str,
}

/// Stored share as echoed by the backend.
///
/// `shared_with` arrives as the recipient's numeric user id and is not read;
/// the username that was sent stays on the grant.
#[derive(Deserialize)]
struct ShareResponse {
    id: ShareId,
    file: FileId,
    #[serde(default)]
    shared_by: Option<String>,
    permission: Permission,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    share_token: Option<Uuid>,
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn obtain_tokens(&self, credentials: &Credentials) -> Result<TokenPair> {
        debug!("POST users/token/");
        let request = self.http.post(self.url("users/token/")?).json(credentials);
        self.json(Call::Token, request).await
    }

    #[instrument(skip_all)]
    async fn refresh_access(&self, refresh: &str) -> Result<String> {
        debug!("POST users/token/refresh/");
        let request = self
            .http
            .post(self.url("users/token/refresh/")?)
            .json(&RefreshRequest { refresh });
        let response: RefreshResponse = self.json(Call::Other, request).await?;
        Ok(response.access)
    }

    #[instrument(skip(self, registration), fields(username = %registration.username))]
    async fn register(&self, registration: &Registration) -> Result<()> {
        debug!("POST users/register/");
        let request = self.http.post(self.url("users/register/")?).json(registration);
        self.send(Call::Other, request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn profile(&self, access: &str) -> Result<UserProfile> {
        debug!("GET users/me/");
        let request = self.http.get(self.url("users/me/")?).bearer_auth(access);
        self.json(Call::Other, request).await
    }

    #[instrument(skip_all)]
    async fn mfa_setup(&self, access: &str) -> Result<MfaEnrollment> {
        debug!("GET users/mfa/setup/");
        let request = self.http.get(self.url("users/mfa/setup/")?).bearer_auth(access);
        self.json(Call::MfaSetup, request).await
    }

    #[instrument(skip_all)]
    async fn mfa_confirm(&self, access: &str, code: &MfaCode) -> Result<()> {
        debug!("POST users/mfa/setup/");
        let request = self
            .http
            .post(self.url("users/mfa/setup/")?)
            .bearer_auth(access)
            .json(&CodeRequest { token: code.as_str() });
        self.send(Call::MfaCode, request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn mfa_verify(&self, access: &str, code: &MfaCode) -> Result<TokenPair> {
        debug!("POST users/mfa/verify/");
        let request = self
            .http
            .post(self.url("users/mfa/verify/")?)
            .bearer_auth(access)
            .json(&CodeRequest { token: code.as_str() });
        self.json(Call::MfaCode, request).await
    }

    #[instrument(skip_all)]
    async fn mfa_disable(&self, access: &str, code: &MfaCode) -> Result<()> {
        debug!("POST users/mfa/disable/");
        let request = self
            .http
            .post(self.url("users/mfa/disable/")?)
            .bearer_auth(access)
            .json(&CodeRequest { token: code.as_str() });
        self.send(Call::MfaCode, request).await?;
        Ok(())
    }

    #[instrument(skip(self, access, upload), fields(name = %upload.name, len = upload.ciphertext.len()))]
    async fn upload(&self, access: &str, upload: FileUpload) -> Result<FileRecord> {
        debug!("POST files/upload/");
        let part = multipart::Part::bytes(upload.ciphertext.to_vec())
            .file_name(upload.name.clone())
            .mime_str(SEALED_MIME)
            .map_err(|e| VaultError::ValidationError(format!("content type: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("encrypted_key", upload.key.as_str().to_string())
            .text("name", upload.name.clone());
        let request = self
            .http
            .post(self.url("files/upload/")?)
            .bearer_auth(access)
            .multipart(form);
        self.json(Call::Other, request).await
    }

    #[instrument(skip_all)]
    async fn list_files(&self, access: &str) -> Result<Vec<FileRecord>> {
        debug!("GET files/");
        let request = self.http.get(self.url("files/")?).bearer_auth(access);
        self.json(Call::Other, request).await
    }

    #[instrument(skip_all)]
    async fn list_shared_with_me(&self, access: &str) -> Result<Vec<SharedFile>> {
        debug!("GET files/shared-with-me/");
        let request = self
            .http
            .get(self.url("files/shared-with-me/")?)
            .bearer_auth(access);
        self.json(Call::Other, request).await
    }

    #[instrument(skip(self, access))]
    async fn shared_by_token(&self, access: &str, token: Uuid) -> Result<SharedFile> {
        debug!("GET files/share/{}/", token);
        let request = self
            .http
            .get(self.url(&format!("files/share/{}/", token))?)
            .bearer_auth(access);
        self.json(Call::Other, request).await
    }

    #[instrument(skip(self, access))]
    async fn fetch(
        &self,
        access: &str,
        id: FileId,
        disposition: Disposition,
    ) -> Result<FetchedFile> {
        debug!("GET files/{}/download/", id);
        let request = self
            .http
            .get(self.url(&format!("files/{}/download/", id))?)
            .query(&[("download", disposition.query_value())])
            .bearer_auth(access);
        let ciphertext = self.send(Call::Other, request).await?.bytes().await?;

        debug!("GET files/{}/", id);
        let request = self
            .http
            .get(self.url(&format!("files/{}/", id))?)
            .bearer_auth(access);
        let record: FileRecord = self.json(Call::Other, request).await?;

        let key = (!record.key.is_empty()).then(|| record.key.clone());
        Ok(FetchedFile { ciphertext, key })
    }

    #[instrument(skip(self, access, grant), fields(file = %grant.file_id, recipient = %grant.recipient))]
    async fn share(&self, access: &str, grant: &ShareGrant) -> Result<ShareGrant> {
        debug!("POST files/share/");
        let body = ShareRequest {
            file: grant.file_id,
            shared_with_username: &grant.recipient,
            permission: grant.permission,
            expires_at: grant.expires_at,
            encrypted_key: grant.key.as_str(),
        };
        let request = self
            .http
            .post(self.url("files/share/")?)
            .bearer_auth(access)
            .json(&body);
        let stored: ShareResponse = self.json(Call::Share, request).await.map_err(|e| match e {
            VaultError::RecipientNotFound(_) => VaultError::RecipientNotFound(grant.recipient.clone()),
            other => other,
        })?;

        let mut saved = grant.clone();
        saved.id = Some(stored.id);
        saved.file_id = stored.file;
        saved.permission = stored.permission;
        saved.expires_at = stored.expires_at;
        saved.shared_by = stored.shared_by;
        saved.share_token = stored.share_token;
        saved.created_at = stored.created_at;
        Ok(saved)
    }

    #[instrument(skip(self, access))]
    async fn delete(&self, access: &str, id: FileId) -> Result<()> {
        debug!("DELETE files/{}/", id);
        let request = self
            .http
            .delete(self.url(&format!("files/{}/", id))?)
            .bearer_auth(access);
        self.send(Call::Other, request).await?;
        Ok(())
    }
}

/// Human-readable message from an error body.
///
/// Handles `{"detail": ..}`, field error maps and plain text.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    match value {
        Value::Object(map) => {
            if let Some(Value::String(detail)) = map.get("detail") {
                return detail.clone();
            }
            map.iter()
                .map(|(field, errors)| format!("{}: {}", field, flatten(errors)))
                .collect::<Vec<_>>()
                .join("; ")
        }
        other => flatten(&other),
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

fn error_for(call: Call, status: StatusCode, body: &str) -> VaultError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED if call == Call::Token => VaultError::InvalidCredentials,
        StatusCode::UNAUTHORIZED => VaultError::Unauthorized,
        StatusCode::BAD_REQUEST => match call {
            Call::MfaSetup if message.to_lowercase().contains("already enabled") => {
                VaultError::MfaAlreadyEnabled
            }
            Call::MfaCode => VaultError::MfaRejected { reason: message },
            Call::Share if recipient_missing(body) => VaultError::RecipientNotFound(message),
            _ => VaultError::ValidationError(message),
        },
        StatusCode::FORBIDDEN => VaultError::AccessDenied(message),
        StatusCode::NOT_FOUND => VaultError::NotFound(message),
        _ => VaultError::Backend {
            status: status.as_u16(),
            message,
        },
    }
}

fn recipient_missing(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("shared_with_username").map(flatten))
        .map(|m| m.to_lowercase().contains("does not exist"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"detail": "MFA is already enabled."}"#, "MFA is already enabled.")]
    #[case(r#"{"token": ["Invalid MFA token."]}"#, "token: Invalid MFA token.")]
    #[case("Bad Gateway", "Bad Gateway")]
    #[case("", "")]
    fn test_error_message(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(error_message(body), expected);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            error_for(Call::Token, StatusCode::UNAUTHORIZED, "{}"),
            VaultError::InvalidCredentials
        );
        assert_eq!(
            error_for(Call::Other, StatusCode::UNAUTHORIZED, "{}"),
            VaultError::Unauthorized
        );
        assert_eq!(
            error_for(
                Call::MfaSetup,
                StatusCode::BAD_REQUEST,
                r#"{"detail": "MFA is already enabled."}"#
            ),
            VaultError::MfaAlreadyEnabled
        );
        assert!(matches!(
            error_for(Call::MfaCode, StatusCode::BAD_REQUEST, r#"{"token": ["Invalid MFA token."]}"#),
            VaultError::MfaRejected { .. }
        ));
        assert!(matches!(
            error_for(
                Call::Share,
                StatusCode::BAD_REQUEST,
                r#"{"shared_with_username": ["User does not exist"]}"#
            ),
            VaultError::RecipientNotFound(_)
        ));
        assert!(matches!(
            error_for(Call::Share, StatusCode::BAD_REQUEST, r#"{"permission": ["bad"]}"#),
            VaultError::ValidationError(_)
        ));
        assert!(matches!(
            error_for(Call::Other, StatusCode::FORBIDDEN, r#"{"detail": "This share has expired."}"#),
            VaultError::AccessDenied(m) if m == "This share has expired."
        ));
        assert_eq!(
            error_for(Call::Other, StatusCode::BAD_GATEWAY, "down"),
            VaultError::Backend {
                status: 502,
                message: "down".into()
            }
        );
    }

    #[test]
    fn test_share_response_with_numeric_recipient() {
        let stored: ShareResponse = serde_json::from_value(serde_json::json!({
            "id": 11,
            "file": 7,
            "shared_by": "alice",
            "shared_with": 5,
            "permission": "DOWNLOAD",
            "expires_at": null,
            "created_at": "2024-01-02T00:00:00Z",
            "share_token": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "share_url": "http://testserver/api/v1/files/share/6f9619ff-8b86-d011-b42d-00cf4fc964ff/"
        }))
        .unwrap();
        assert_eq!(stored.id, ShareId(11));
        assert_eq!(stored.file, FileId(7));
        assert_eq!(stored.permission, Permission::Download);
        assert!(stored.share_token.is_some());
    }

    #[test]
    fn test_base_url_join() {
        let backend = HttpBackend::new(&ClientConfig::new("http://localhost:8000/api/v1")).unwrap();
        assert_eq!(
            backend.url("files/7/download/").unwrap().as_str(),
            "http://localhost:8000/api/v1/files/7/download/"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpBackend::new(&ClientConfig::new("not a url")),
            Err(VaultError::ValidationError(_))
        ));
    }
}
