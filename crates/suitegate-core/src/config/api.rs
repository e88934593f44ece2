//! SmartSuite API connection settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Connection settings for the SmartSuite REST API.
///
/// Secrets are never stored in the file itself; the config names the
/// environment variables that hold them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Environment variable holding the workspace (account) id.
    #[serde(default = "default_workspace_id_env")]
    pub workspace_id_env: String,

    /// Timeout applied to every outbound request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Low-risk listing endpoint used by dry-run connectivity probes.
    #[serde(default = "default_probe_endpoint")]
    pub probe_endpoint: String,
}

/// Resolved API credentials.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub workspace_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            workspace_id_env: default_workspace_id_env(),
            timeout_secs: default_timeout_secs(),
            probe_endpoint: default_probe_endpoint(),
        }
    }
}

impl ApiConfig {
    /// Read credentials from the configured environment variables.
    pub fn credentials_from_env(&self) -> Result<ApiCredentials, ConfigError> {
        let api_key = read_env(&self.api_key_env)?;
        let workspace_id = read_env(&self.workspace_id_env)?;
        Ok(ApiCredentials {
            api_key,
            workspace_id,
        })
    }

    /// Request timeout as a [`std::time::Duration`].
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

fn read_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Config(format!(
            "environment variable {} is not set",
            name
        ))),
    }
}

fn default_base_url() -> String {
    "https://app.smartsuite.com/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "SMARTSUITE_API_TOKEN".to_string()
}

fn default_workspace_id_env() -> String {
    "SMARTSUITE_WORKSPACE_ID".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_probe_endpoint() -> String {
    "/solutions/".to_string()
}
