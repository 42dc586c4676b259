//! Generation backend trait and concrete implementations.
//!
//! Backends:
//!   HttpModelBackend: a model service exposing `POST /generate` and `GET /health`
//!   TemplateBackend:  offline keyword model used when no service is configured

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

use chemforge_common::{ChemforgeError, ErrorKind, SandboxClient};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),
    #[error("Backend call failed: {0}")]
    BackendCallFailed(String),
    #[error("Backend '{backend}' timed out after {timeout_ms} ms")]
    Timeout { backend: String, timeout_ms: u64 },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::UnknownBackend(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<ChemforgeError> for ModelError {
    fn from(e: ChemforgeError) -> Self {
        ModelError::BackendCallFailed(e.to_string())
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub smiles: String,
    pub confidence: f64,
    pub execution_time_ms: u64,
    pub model_version: String,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Canonical backend name, e.g. `your_model`.
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<ModelOutput, ModelError>;
    /// Ok when the backend can serve requests.
    async fn health(&self) -> Result<(), ModelError>;
}

// ── 1. HTTP model service ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    smiles: String,
    confidence: f64,
    #[serde(default)]
    model_version: Option<String>,
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, ModelError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    if status >= 400 {
        let message = body["detail"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(ModelError::Api { status, message });
    }
    Ok(body)
}

pub struct HttpModelBackend {
    name: String,
    version: String,
    description: String,
    base_url: String,
    api_key: Option<SecretString>,
    client: SandboxClient,
}

impl HttpModelBackend {
    /// The base URL's host is added to the client's allowlist.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        mut client: SandboxClient,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        client.allow_url_host(&base_url);
        Self {
            name: name.into(),
            version: "remote".to_string(),
            description: "AI model for molecule generation".to_string(),
            base_url,
            api_key: None,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn generate(&self, prompt: &str) -> Result<ModelOutput, ModelError> {
        let url = format!("{}/generate", self.base_url);
        let started = Instant::now();
        let req = self.client.post(&url)?.json(&GenerateRequest { prompt, model: &self.name });
        let resp = self.authorize(req).send().await?;
        let json = check_response_status(resp).await?;
        let parsed: GenerateResponse = serde_json::from_value(json)
            .map_err(|e| ModelError::BackendCallFailed(format!("malformed response: {}", e)))?;

        Ok(ModelOutput {
            smiles: parsed.smiles.trim().to_string(),
            confidence: parsed.confidence.clamp(0.0, 1.0),
            execution_time_ms: started.elapsed().as_millis() as u64,
            model_version: parsed.model_version.unwrap_or_else(|| self.version.clone()),
        })
    }

    async fn health(&self) -> Result<(), ModelError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.authorize(self.client.get(&url)?).send().await?;
        check_response_status(resp).await.map(|_| ())
    }
}

// ── 2. Offline template model ────────────────────────────────────────────────

/// Keyword → SMILES pairs recognised by the template model.
const TEMPLATE_LIBRARY: &[(&str, &str)] = &[
    ("aspirin", "CC(=O)Oc1ccccc1C(=O)O"),
    ("caffeine", "Cn1cnc2c1c(=O)n(C)c(=O)n2C"),
    ("ethanol", "CCO"),
    ("alcohol", "CCO"),
    ("paracetamol", "CC(=O)Nc1ccc(O)cc1"),
    ("acetaminophen", "CC(=O)Nc1ccc(O)cc1"),
    ("ibuprofen", "CC(C)Cc1ccc(cc1)C(C)C(=O)O"),
    ("benzene", "c1ccccc1"),
    ("toluene", "Cc1ccccc1"),
    ("phenol", "Oc1ccccc1"),
    ("pyridine", "c1ccncc1"),
    ("methane", "C"),
    ("acetone", "CC(=O)C"),
    ("urea", "NC(=O)N"),
    ("glucose", "OC[C@H]1OC(O)[C@H](O)[C@@H](O)[C@@H]1O"),
    ("nicotine", "CN1CCC[C@H]1c1cccnc1"),
    ("dopamine", "NCCc1ccc(O)c(O)c1"),
    ("serotonin", "NCCc1c[nH]c2ccc(O)cc12"),
];

/// Picked by prompt hash when no keyword matches.
const FALLBACK_POOL: &[&str] = &[
    "CCO",
    "CC(=O)O",
    "c1ccccc1",
    "CC(C)O",
    "CCN(CC)CC",
    "OC1CCCCC1",
    "c1ccncc1",
    "CC(=O)Nc1ccc(O)cc1",
];

const FALLBACK_CONFIDENCE: f64 = 0.35;

/// Deterministic offline model: matches prompt words against a small library
/// of named molecules and falls back to a hash-selected simple structure.
pub struct TemplateBackend {
    name: String,
    version: String,
    description: String,
    match_confidence: f64,
}

impl TemplateBackend {
    pub fn new(name: impl Into<String>, description: impl Into<String>, match_confidence: f64) -> Self {
        Self {
            name: name.into(),
            version: "template-1.0".to_string(),
            description: description.into(),
            match_confidence: match_confidence.clamp(0.0, 1.0),
        }
    }

    fn pick(&self, prompt: &str) -> (&'static str, f64) {
        let lower = prompt.to_lowercase();
        for token in word_regex().find_iter(&lower) {
            if let Some((_, smiles)) = TEMPLATE_LIBRARY.iter().find(|(k, _)| *k == token.as_str()) {
                return (smiles, self.match_confidence);
            }
        }
        let idx = (fnv1a(lower.trim().as_bytes()) % FALLBACK_POOL.len() as u64) as usize;
        (FALLBACK_POOL[idx], FALLBACK_CONFIDENCE)
    }
}

fn word_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl ModelBackend for TemplateBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn generate(&self, prompt: &str) -> Result<ModelOutput, ModelError> {
        let started = Instant::now();
        let (smiles, confidence) = self.pick(prompt);
        debug!(backend = %self.name, smiles, confidence, "Template generation");
        Ok(ModelOutput {
            smiles: smiles.to_string(),
            confidence,
            execution_time_ms: started.elapsed().as_millis() as u64,
            model_version: self.version.clone(),
        })
    }

    async fn health(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemforge_molecules::parse_smiles;

    #[test]
    fn test_template_library_is_valid() {
        for (keyword, smiles) in TEMPLATE_LIBRARY {
            assert!(parse_smiles(smiles).is_ok(), "{} -> {} does not parse", keyword, smiles);
        }
        for smiles in FALLBACK_POOL {
            assert!(parse_smiles(smiles).is_ok(), "{} does not parse", smiles);
        }
    }

    #[tokio::test]
    async fn test_template_keyword_match() {
        let backend = TemplateBackend::new("your_model", "test", 0.9);
        let out = backend.generate("Generate Aspirin, please").await.unwrap();
        assert_eq!(out.smiles, "CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(out.confidence, 0.9);
        assert_eq!(out.model_version, "template-1.0");
        assert!(backend.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_template_fallback_is_deterministic() {
        let backend = TemplateBackend::new("molt5", "test", 0.8);
        let a = backend.generate("a soluble kinase inhibitor").await.unwrap();
        let b = backend.generate("a soluble kinase inhibitor").await.unwrap();
        assert_eq!(a.smiles, b.smiles);
        assert_eq!(a.confidence, FALLBACK_CONFIDENCE);
        assert!(FALLBACK_POOL.contains(&a.smiles.as_str()));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ModelError::UnknownBackend("x".into()).kind(), ErrorKind::NotFound);
        let timeout = ModelError::Timeout { backend: "x".into(), timeout_ms: 5 };
        assert_eq!(timeout.kind(), ErrorKind::Internal);
        assert!(timeout.to_string().contains("5 ms"));
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
