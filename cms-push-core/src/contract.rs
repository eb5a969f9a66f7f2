//! # contract: collaborator interfaces of the upload pipeline
//!
//! The pipeline in [`crate::upload_folder`] never talks to the network or to
//! Node.js directly. It goes through the two traits defined here:
//!
//! - [`Uploader`]: puts one local file at a destination path in the remote store.
//! - [`FieldsTransformer`]: turns a scripted `fields.js` into a static `fields.json`.
//!
//! Both are annotated for `mockall`, so tests (and downstream crates with the
//! `test-export-mocks` feature) get `MockUploader` and `MockFieldsTransformer`.
//!
//! Upload failures are reported as an [`UploadError`] carrying an explicit
//! [`ErrorKind`] tag. The tag is decided once, at the client boundary, and the
//! scheduler only ever matches on it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

/// Whether a failed upload is worth a second attempt in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Authorization, quota or permanent rejection. Aborts the whole run.
    Fatal,
    /// Network trouble or a server-side failure. Retried once.
    Transient,
}

/// Error returned by an [`Uploader`] for a single file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UploadError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
}

impl UploadError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            status: None,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    /// Builds an error from a non-success HTTP response of the remote store.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        let detail = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| body.trim().to_string());
        let message = if detail.is_empty() {
            format!("remote store responded with status {status}")
        } else {
            format!("remote store responded with status {status}: {detail}")
        };
        Self {
            kind: classify_status(status, parsed.as_ref()),
            status: Some(status),
            message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Fatal)
    }
}

/// Error body returned by the remote store alongside a non-success status.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub category: Option<String>,
    pub policy_name: Option<String>,
}

/// Decides the [`ErrorKind`] of a non-success response.
///
/// 401 and 403 are fatal. 429 is fatal only when the daily quota is exhausted
/// (`policyName: DAILY`); a per-second limit is worth a retry. A 400 is fatal
/// when the token lacks scopes. Everything else is treated as transient.
pub fn classify_status(status: u16, body: Option<&ApiErrorBody>) -> ErrorKind {
    let category = body.and_then(|b| b.category.as_deref());
    let policy = body.and_then(|b| b.policy_name.as_deref());
    match status {
        401 | 403 => ErrorKind::Fatal,
        429 if policy == Some("DAILY") => ErrorKind::Fatal,
        400 if category == Some("MISSING_SCOPES") => ErrorKind::Fatal,
        _ => ErrorKind::Transient,
    }
}

/// Build mode the remote store applies to an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Draft,
    Publish,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Draft => "draft",
            BuildMode::Publish => "publish",
        }
    }
}

/// Query parameters forwarded with every upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub build_mode: Option<BuildMode>,
}

impl QueryOptions {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        self.build_mode
            .map(|mode| vec![("buildMode", mode.as_str())])
            .unwrap_or_default()
    }
}

/// Puts single files into the remote content store.
///
/// Implemented by the HTTP client in the binary crate and by mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the file at `source` to `destination` (a forward-slash path) for `account_id`.
    async fn upload(
        &self,
        account_id: u64,
        source: &Path,
        destination: &str,
        query: &QueryOptions,
    ) -> Result<(), UploadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FieldsError {
    #[error("failed to launch node for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluating {path} failed: {stderr}")]
    Script { path: PathBuf, stderr: String },

    #[error("{path} did not produce valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must export an array of fields")]
    NotAnArray { path: PathBuf },

    #[error("failed to write fields output for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a scripted fields file into a static fields descriptor.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait FieldsTransformer: Send + Sync {
    /// Evaluate `scripted` and write the resulting `fields.json` into `write_dir`.
    /// Returns the path of the written descriptor.
    fn convert(
        &self,
        scripted: &Path,
        write_dir: &Path,
        field_options: &[String],
    ) -> Result<PathBuf, FieldsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_fatal() {
        assert_eq!(classify_status(401, None), ErrorKind::Fatal);
        assert_eq!(classify_status(403, None), ErrorKind::Fatal);
    }

    #[test]
    fn daily_quota_is_fatal_but_burst_limit_is_not() {
        let daily = UploadError::from_response(429, r#"{"policyName":"DAILY"}"#);
        assert!(daily.is_fatal());

        let burst = UploadError::from_response(429, r#"{"policyName":"SECONDLY"}"#);
        assert_eq!(burst.kind(), ErrorKind::Transient);
    }

    #[test]
    fn missing_scopes_is_fatal() {
        let err = UploadError::from_response(
            400,
            r#"{"status":"error","message":"missing scopes","category":"MISSING_SCOPES"}"#,
        );
        assert!(err.is_fatal());
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("missing scopes"));
    }

    #[test]
    fn server_errors_and_validation_failures_are_transient() {
        assert_eq!(classify_status(500, None), ErrorKind::Transient);
        assert_eq!(classify_status(503, None), ErrorKind::Transient);

        let validation = UploadError::from_response(400, "template has a syntax error");
        assert!(!validation.is_fatal());
        assert!(validation.to_string().contains("syntax error"));
    }

    #[test]
    fn build_mode_becomes_a_query_pair() {
        assert!(QueryOptions::default().to_query_pairs().is_empty());
        let query = QueryOptions {
            build_mode: Some(BuildMode::Publish),
        };
        assert_eq!(query.to_query_pairs(), vec![("buildMode", "publish")]);
    }
}
