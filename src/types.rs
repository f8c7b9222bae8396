//! Core types for the Drive wrapper.
//!
//! Wire types are serde-friendly with camelCase JSON field naming and follow
//! the Google Drive API v3 resource model. `RemoteObject` is the crate's own
//! view of a remote file or folder, built from wire metadata and never sent
//! back over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for Drive operations.
///
/// `TransientQuota` and `IdentityQuota` are internal signals consumed by the
/// retry and rotation layers in `client`; they are converted to
/// `RemoteOperation` before an error reaches a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DriveErrorKind {
    /// No usable credential, or the identity directory is malformed/empty.
    InvalidCredentials,
    /// Identifier parsing failed, or a referenced object has no resolvable id.
    NotFound,
    /// Semantically invalid request (e.g. cloning a container into itself).
    InvalidOperation,
    /// The remote service rejected the request with a non-retryable reason.
    RemoteOperation,
    /// Per-call rate limit (`rateLimitExceeded`) — retried with backoff.
    TransientQuota,
    /// Per-identity quota (`userRateLimitExceeded`, `dailyLimitExceeded`) —
    /// triggers identity rotation.
    IdentityQuota,
    /// Local path does not exist or is neither file nor directory.
    PathNotFound,
    /// Network/transport failure.
    Network,
    /// Response body could not be decoded.
    Parse,
}

impl std::fmt::Display for DriveErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "InvalidCredentials"),
            Self::NotFound => write!(f, "NotFound"),
            Self::InvalidOperation => write!(f, "InvalidOperation"),
            Self::RemoteOperation => write!(f, "RemoteOperation"),
            Self::TransientQuota => write!(f, "TransientQuota"),
            Self::IdentityQuota => write!(f, "IdentityQuota"),
            Self::PathNotFound => write!(f, "PathNotFound"),
            Self::Network => write!(f, "Network"),
            Self::Parse => write!(f, "Parse"),
        }
    }
}

/// A Drive wrapper error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveError {
    pub kind: DriveErrorKind,
    pub message: String,
    /// How many attempts the retry layer made before giving up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl std::fmt::Display for DriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(n) = self.attempts {
            if n > 1 {
                write!(f, " (after {} attempts)", n)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for DriveError {}

impl DriveError {
    pub fn new(kind: DriveErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: None,
        }
    }

    pub fn invalid_credentials(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::InvalidCredentials, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::NotFound, msg)
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::InvalidOperation, msg)
    }

    pub fn path_not_found(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::PathNotFound, msg)
    }

    /// Terminal remote failure. The message is sanitized of `<`/`>` so it is
    /// safe to embed in logs and rendered output.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::RemoteOperation, sanitize(&msg.into()))
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::Network, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::Parse, msg)
    }

    /// Attach the attempt count observed by the retry layer.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Convert the internal quota signals into the caller-facing
    /// `RemoteOperation` kind, keeping message and attempt count.
    pub fn into_remote(mut self) -> Self {
        if matches!(
            self.kind,
            DriveErrorKind::TransientQuota | DriveErrorKind::IdentityQuota
        ) {
            self.kind = DriveErrorKind::RemoteOperation;
            self.message = sanitize(&self.message);
        }
        self
    }

    /// Classify a structured error response.
    ///
    /// The machine reason in `error.errors[0].reason` drives classification;
    /// status-code mapping is the fallback when no reason is present.
    pub fn from_response(status: u16, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(payload) = parsed.error {
                let first = payload.errors.into_iter().next();
                let reason = first
                    .as_ref()
                    .and_then(|e| e.reason.clone())
                    .unwrap_or_default();
                let message = first
                    .and_then(|e| e.message)
                    .or(payload.message)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                return match reason.as_str() {
                    "rateLimitExceeded" => {
                        Self::new(DriveErrorKind::TransientQuota, message)
                    }
                    "userRateLimitExceeded" | "dailyLimitExceeded" => {
                        Self::new(DriveErrorKind::IdentityQuota, message)
                    }
                    _ => match status {
                        401 => Self::invalid_credentials(message),
                        404 => Self::not_found(message),
                        _ => Self::remote(message),
                    },
                };
            }
        }
        let snippet: String = body.chars().take(500).collect();
        match status {
            401 => Self::invalid_credentials(format!("HTTP 401: {}", snippet)),
            404 => Self::not_found(format!("HTTP 404: {}", snippet)),
            _ => Self::remote(format!("HTTP {}: {}", status, snippet)),
        }
    }
}

/// Result alias used throughout the crate.
pub type DriveResult<T> = Result<T, DriveError>;

fn sanitize(msg: &str) -> String {
    msg.replace(['<', '>'], "")
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: Vec<ErrorItem>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    reason: Option<String>,
    message: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Scopes & MIME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// OAuth2 scopes.
pub mod scopes {
    /// Full access to all Drive files; the only scope token issuance asks for.
    pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";
}

/// MIME type sentinels.
pub mod mime_types {
    /// Marks an object as a folder.
    pub const FOLDER: &str = "application/vnd.google-apps.folder";
    /// Used when a local file's type cannot be guessed.
    pub const FALLBACK: &str = "text/plain";
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A file or folder resource as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// int64 serialized as a JSON string; absent for folders and some files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed: Option<bool>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == mime_types::FOLDER
    }

    /// Declared size in bytes; `None` when absent or unparsable.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Response of a `files.list` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A permission resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type", default)]
    pub permission_type: String,
}

/// Metadata body for `files.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

/// Metadata body for `files.copy`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFileRequest {
    pub parents: Vec<String>,
}

/// Metadata body for `files.update`. Serializes to `{}` when nothing is set
/// (the move call carries its parent changes in query parameters).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed: Option<bool>,
}

/// Body for `permissions.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    pub role: String,
    #[serde(rename = "type")]
    pub permission_type: String,
    pub with_link: bool,
}

impl CreatePermissionRequest {
    /// Anyone-with-the-link reader access.
    pub fn public_reader() -> Self {
        Self {
            role: "reader".to_string(),
            permission_type: "anyone".to_string(),
            with_link: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Object model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether a remote object is a plain file or a folder (container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    File,
    Folder,
}

/// The crate's view of one remote file or folder.
///
/// Built from wire metadata whenever a call returns it; never mutated after
/// construction — updates produce a replacement value. `url` is derived
/// purely from `(id, kind)` and costs no network round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub kind: ObjectKind,
    pub mime_type: String,
    /// Size in bytes; folders report their aggregated clone size here when
    /// produced by a clone, otherwise `None`.
    pub size: Option<u64>,
    pub parents: Vec<String>,
    /// Shareable link for this object.
    pub url: String,
}

impl From<DriveFile> for RemoteObject {
    fn from(file: DriveFile) -> Self {
        let kind = if file.is_folder() {
            ObjectKind::Folder
        } else {
            ObjectKind::File
        };
        let url = crate::links::share_link(&file.id, kind);
        Self {
            id: file.id,
            name: file.name,
            kind,
            mime_type: file.mime_type,
            size: file.size.as_deref().and_then(|s| s.parse().ok()),
            parents: file.parents,
            url,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Upload progress
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Progress of the most recent chunked upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadStatus {
    /// Fraction complete in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.bytes_sent as f64 / self.total_bytes as f64
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Backoff/attempt policy for the retry layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Attempt ceiling for ordinary operations.
    pub attempts: u32,
    /// Attempt ceiling for destructive operations (delete, empty-trash, move).
    pub destructive_attempts: u32,
    /// Exponential backoff multiplier, in seconds.
    pub backoff_multiplier_secs: u64,
    /// Floor of the computed delay.
    pub backoff_min_secs: u64,
    /// Ceiling of the computed delay.
    pub backoff_max_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            destructive_attempts: 3,
            backoff_multiplier_secs: 2,
            backoff_min_secs: 3,
            backoff_max_secs: 6,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    pub retry: RetryPolicy,
    /// Resumable upload chunk size in bytes.
    pub chunk_size: usize,
    /// Page size for child listings.
    pub page_size: u32,
    /// Default result limit for searches.
    pub search_limit: u32,
    /// Request timeout for metadata calls, in seconds.
    pub timeout_secs: u64,
    /// Request timeout for upload chunk transfers, in seconds.
    pub upload_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_size: 50 * 1024 * 1024,
            page_size: 200,
            search_limit: 20,
            timeout_secs: 30,
            upload_timeout_secs: 300,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
