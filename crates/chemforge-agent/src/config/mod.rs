//! Configuration loading for Chemforge.
//! Reads chemforge.toml from the current directory or path in CHEMFORGE_CONFIG env var.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chemforge_models::{normalize_backend_name, DEFAULT_BACKEND};
use chemforge_molecules::{DockingConfig, EmbedConfig, FetchPolicy};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Per-backend service endpoints, keyed by backend name.
    #[serde(default)]
    pub backends: BTreeMap<String, BackendEndpoint>,
    #[serde(default)]
    pub embedding: EmbedConfig,
    #[serde(default)]
    pub docking: DockingSection,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_backend")]
    pub default_backend: String,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

fn default_backend()           -> String { DEFAULT_BACKEND.to_string() }
fn default_call_timeout_ms()   -> u64    { 30_000 }
fn default_health_timeout_ms() -> u64    { 5_000 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            call_timeout_ms: default_call_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

/// A model service. Without a `base_url` the backend is served by the
/// offline template model.
#[derive(Debug, Default, Deserialize)]
pub struct BackendEndpoint {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockingSection {
    #[serde(flatten)]
    pub engine: DockingConfig,
    /// YAML file replacing the built-in target table.
    #[serde(default)]
    pub targets_file: Option<PathBuf>,
    #[serde(default)]
    pub fetch_policy: FetchPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// When false, target structures are never downloaded.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_rcsb_base_url")]
    pub rcsb_base_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Extra hosts for the HTTP allowlist.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

fn bool_true()                  -> bool   { true }
fn default_rcsb_base_url()      -> String { chemforge_molecules::pdb::RCSB_DOWNLOAD_URL.to_string() }
fn default_fetch_timeout_secs() -> u64    { 5 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: bool_true(),
            rcsb_base_url: default_rcsb_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cache_dir: None,
            allowed_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

fn default_history_path() -> PathBuf { PathBuf::from("./chemforge-history.jsonl") }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: bool_true(), path: default_history_path() }
    }
}

mod tests;

impl Config {
    /// Load configuration from chemforge.toml.
    /// Checks CHEMFORGE_CONFIG env var first, then current directory.
    /// A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CHEMFORGE_CONFIG")
            .unwrap_or_else(|_| "chemforge.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.generation.default_backend.trim().is_empty() {
            anyhow::bail!("generation.default_backend must not be empty");
        }
        Ok(config)
    }

    /// Endpoint for a backend, matching config keys written as any alias.
    pub fn endpoint(&self, backend: &str) -> Option<&BackendEndpoint> {
        let canonical = normalize_backend_name(backend);
        self.backends
            .iter()
            .find(|(key, _)| normalize_backend_name(key) == canonical)
            .map(|(_, endpoint)| endpoint)
    }

    /// API key for a backend: the configured value, else `CHEMFORGE_<BACKEND>_API_KEY`.
    pub fn api_key(&self, backend: &str) -> Option<SecretString> {
        self.api_key_with(backend, |var| std::env::var(var).ok())
    }

    /// As [`Config::api_key`], reading the environment through `lookup`.
    pub fn api_key_with<F>(&self, backend: &str, lookup: F) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = self.endpoint(backend).and_then(|b| b.api_key.as_ref()) {
            return Some(SecretString::from(key.expose_secret().to_string()));
        }
        lookup(&api_key_env_var(&normalize_backend_name(backend)))
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from)
    }
}

pub fn api_key_env_var(backend: &str) -> String {
    let upper: String = backend
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("CHEMFORGE_{}_API_KEY", upper)
}
