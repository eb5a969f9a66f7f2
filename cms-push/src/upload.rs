#![doc = "HTTP implementation of the core `Uploader`: puts files into the remote content store."]
//
//! # Remote upload client
//!
//! [`CmsClient`] sends each file as a multipart `PUT` to the store's file
//! mapper endpoint, authenticated with a bearer token.
//!
//! Every failure is tagged at this boundary:
//! - non-success responses go through [`UploadError::from_response`];
//! - transport problems (connect, timeout, interrupted body) are transient;
//! - a local file that cannot be read, or a request that cannot even be built, is fatal.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use cms_push_core::contract::{QueryOptions, UploadError, Uploader};
use reqwest::multipart::{Form, Part};

use crate::load_config::CliConfig;

pub const DEFAULT_API_BASE_URL: &str = "https://api.hubapi.com";
const UPLOAD_PATH: &str = "content/filemapper/v1/upload";

pub struct CmsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl CmsClient {
    pub fn new(
        base_url: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cms-push/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::info!(base_url, timeout_secs = timeout.as_secs(), "Initialized CmsClient");
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    pub fn from_config(config: &CliConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.api_base_url,
            config.access_token.expose(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Endpoint for `destination`; the whole destination is a single encoded path segment.
    pub fn upload_url(&self, destination: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            UPLOAD_PATH,
            urlencoding::encode(destination)
        )
    }
}

#[async_trait]
impl Uploader for CmsClient {
    async fn upload(
        &self,
        account_id: u64,
        source: &Path,
        destination: &str,
        query: &QueryOptions,
    ) -> Result<(), UploadError> {
        let content = tokio::fs::read(source).await.map_err(|e| {
            tracing::error!(error = ?e, file = %source.display(), "Failed to read file for upload");
            UploadError::fatal(format!("failed to read {}: {e}", source.display()))
        })?;
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let form = Form::new().part("file", Part::bytes(content).file_name(file_name));

        let url = self.upload_url(destination);
        tracing::debug!(url = %url, file = %source.display(), "Sending upload request");
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .query(&query.to_query_pairs())
            .query(&[("portalId", account_id)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = ?e, destination, "Upload request did not complete");
                if e.is_builder() {
                    UploadError::fatal(format!("invalid upload request for {destination}: {e}"))
                } else {
                    UploadError::transient(format!("upload request for {destination} failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(destination, status = status.as_u16(), "Upload accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = UploadError::from_response(status.as_u16(), &body);
        tracing::warn!(destination, status = status.as_u16(), fatal = err.is_fatal(), "Upload rejected");
        Err(err)
    }
}
