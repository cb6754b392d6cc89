//! Configuration loading for Prepair.
//! Reads prepair.toml from the current directory or the path in
//! PREPAIR_CONFIG. Secrets (proxy credentials, inference API key) come from
//! the environment, never from the config file.

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    pub inference: InferenceConfig,
    #[serde(default)]
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving the three bucket files.
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory of local preprint PDFs to process.
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_max_inference")]
    pub max_concurrent_inference: usize,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: usize,
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
}

fn default_max_inference()     -> usize { 8 }
fn default_success_threshold() -> usize { 1000 }
fn default_chunk_chars()       -> usize { 7500 }

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_inference: default_max_inference(),
            success_threshold: default_success_threshold(),
            chunk_chars: default_chunk_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key (optional for local vLLM).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String { "PREPAIR_API_KEY".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Authenticating proxy login endpoint. When set, the credentials below
    /// must be present in the environment or startup aborts.
    pub proxy_login_url: Option<String>,
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

fn default_navigation_timeout() -> u64 { 40 }
fn default_settle()             -> u64 { 5 }

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            proxy_login_url: None,
            navigation_timeout_secs: default_navigation_timeout(),
            settle_secs: default_settle(),
        }
    }
}

impl Config {
    /// Load configuration from prepair.toml.
    /// Checks PREPAIR_CONFIG first, then the current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("PREPAIR_CONFIG")
            .unwrap_or_else(|_| "prepair.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy prepair.example.toml to prepair.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Proxy credentials from the environment. Required — and fatal when
/// missing — whenever a proxy login URL is configured; `None` otherwise.
pub fn proxy_credentials(
    resolver: &ResolverSettings,
) -> anyhow::Result<Option<(SecretString, SecretString)>> {
    if resolver.proxy_login_url.is_none() {
        return Ok(None);
    }
    let username = std::env::var("PREPAIR_PROXY_USERNAME")
        .map_err(|_| anyhow::anyhow!("PREPAIR_PROXY_USERNAME not set but a proxy is configured"))?;
    let password = std::env::var("PREPAIR_PROXY_PASSWORD")
        .map_err(|_| anyhow::anyhow!("PREPAIR_PROXY_PASSWORD not set but a proxy is configured"))?;
    if username.trim().is_empty() || password.trim().is_empty() {
        anyhow::bail!("Proxy credentials are present but empty");
    }
    Ok(Some((SecretString::from(username), SecretString::from(password))))
}
