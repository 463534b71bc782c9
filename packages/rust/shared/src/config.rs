//! Application configuration for Docsmith.
//!
//! User config lives at `~/.docsmith/docsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsmith";

// ---------------------------------------------------------------------------
// Config structs (matching docsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Page store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Similarity index sidecar settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Generation provider settings.
    #[serde(default)]
    pub model: ModelConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5001".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libsql database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/docsmith.db".into()
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the similarity index sidecar.
    #[serde(default = "default_index_endpoint")]
    pub endpoint: String,

    /// Timeout in seconds for index requests.
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: default_index_endpoint(),
            timeout_secs: default_index_timeout(),
        }
    }
}

fn default_index_endpoint() -> String {
    "http://127.0.0.1:5100".into()
}
fn default_index_timeout() -> u64 {
    10
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the chat-completion provider.
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Completion token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout in seconds for completion requests. Expiry is a generation
    /// failure, not a retry trigger.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_model_endpoint() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model_name() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_api_key_env() -> String {
    "MODEL_API_KEY".into()
}
fn default_model_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsmith/docsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(DocsmithError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the configured service endpoints parse as http(s) URLs.
pub fn validate_endpoints(config: &AppConfig) -> Result<()> {
    for (section, endpoint) in [
        ("index", &config.index.endpoint),
        ("model", &config.model.endpoint),
    ] {
        let url = Url::parse(endpoint).map_err(|e| {
            DocsmithError::config(format!("[{section}] endpoint '{endpoint}': {e}"))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DocsmithError::config(format!(
                "[{section}] endpoint '{endpoint}': expected an http or https URL"
            )));
        }
    }
    Ok(())
}
