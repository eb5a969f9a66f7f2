/// `load_config` module: loads the static YAML config and injects the access token from the environment.
///
/// The YAML file carries no secrets. The bearer token is read from
/// `CMS_ACCESS_TOKEN` (a `.env` file is honoured by `main`).
///
/// # Accepted YAML
/// ```yaml
/// account_id: 123456
/// api_base_url: https://api.hubapi.com   # optional
/// concurrency: 10                        # optional
/// request_timeout_secs: 60               # optional
/// node_binary: node                      # optional
/// upload:                                # optional, see UploadFolderOptions
///   convert_fields: true
///   save_output: false
///   field_options: []
///   extra_extensions: []
///   ignore_file: deploy.ignore          # relative to the source folder
/// ```
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use cms_push_core::{UploadFolderOptions, DEFAULT_CONCURRENCY};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::upload::DEFAULT_API_BASE_URL;

pub const ACCESS_TOKEN_ENV: &str = "CMS_ACCESS_TOKEN";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Bearer token; never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub account_id: u64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_node_binary")]
    pub node_binary: PathBuf,
    #[serde(default)]
    pub upload: UploadFolderOptions,
    #[serde(skip)]
    pub access_token: AccessToken,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_node_binary() -> PathBuf {
    PathBuf::from("node")
}

/// Loads a static YAML config file and injects the access token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let token = match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => token,
        _ => {
            error!(env = ACCESS_TOKEN_ENV, "Access token is not set");
            return Err(anyhow::anyhow!(
                "Environment variable {ACCESS_TOKEN_ENV} must be set to an access token"
            ));
        }
    };
    config.access_token = AccessToken(token);

    if config.concurrency == 0 {
        return Err(anyhow::anyhow!("concurrency must be at least 1"));
    }

    info!(
        account_id = config.account_id,
        api_base_url = %config.api_base_url,
        concurrency = config.concurrency,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_token() {
        let token = AccessToken("secret-value".to_string());
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
        assert_eq!(token.expose(), "secret-value");
    }
}
