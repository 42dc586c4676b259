//! Concurrent fan-out of one prompt to several generation backends.
//!
//! Every requested backend yields exactly one candidate, in request order.
//! A backend that cannot be resolved, errors, times out or returns unusable
//! output is replaced by a placeholder candidate rather than failing the batch.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use chemforge_molecules::parse_smiles;

use crate::backend::{ModelError, ModelOutput};
use crate::registry::{normalize_backend_name, BackendRegistry, DEFAULT_BACKEND};

/// Notation used for placeholder candidates.
pub const PLACEHOLDER_SMILES: &str = "C";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCandidate {
    /// Normalized name of the backend that produced this candidate.
    pub source: String,
    pub smiles: String,
    pub confidence: f64,
    /// Seconds.
    pub execution_time: f64,
    pub model_version: String,
    pub is_valid: bool,
}

impl GenerationCandidate {
    pub fn placeholder(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            smiles: PLACEHOLDER_SMILES.to_string(),
            confidence: 0.0,
            execution_time: 0.0,
            model_version: "error".to_string(),
            is_valid: false,
        }
    }

    fn from_output(source: String, output: ModelOutput) -> Self {
        let execution_time = output.execution_time_ms as f64 / 1000.0;
        match parse_smiles(&output.smiles) {
            Ok(_) => Self {
                source,
                smiles: output.smiles,
                confidence: output.confidence.clamp(0.0, 1.0),
                execution_time,
                model_version: output.model_version,
                is_valid: true,
            },
            Err(e) => {
                warn!(backend = %source, smiles = %output.smiles, error = %e, "Backend returned invalid SMILES");
                Self {
                    source,
                    smiles: output.smiles,
                    confidence: 0.0,
                    execution_time,
                    model_version: output.model_version,
                    is_valid: false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Backend used when the request names none.
    pub default_backend: String,
    /// Per-backend call timeout, in milliseconds.
    pub call_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_backend: DEFAULT_BACKEND.to_string(),
            call_timeout_ms: 30_000,
        }
    }
}

pub struct GenerationOrchestrator {
    registry: Arc<BackendRegistry>,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    pub fn new(registry: Arc<BackendRegistry>, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// One candidate per requested backend, in request order. An empty
    /// request means the default backend.
    pub async fn generate(&self, prompt: &str, requested: &[String]) -> Vec<GenerationCandidate> {
        let names: Vec<String> = if requested.is_empty() {
            info!(backend = %self.config.default_backend, "No backends requested; using default");
            vec![self.config.default_backend.clone()]
        } else {
            requested.to_vec()
        };

        let calls = names.iter().map(|name| self.call_backend(prompt, name));
        let candidates = join_all(calls).await;

        let valid = candidates.iter().filter(|c| c.is_valid).count();
        info!(requested = candidates.len(), valid, "Generation batch complete");
        candidates
    }

    async fn call_backend(&self, prompt: &str, requested: &str) -> GenerationCandidate {
        let source = normalize_backend_name(requested);
        match self.try_call(prompt, &source).await {
            Ok(output) => {
                info!(
                    backend = %source,
                    latency_ms = output.execution_time_ms,
                    confidence = output.confidence,
                    "Backend responded"
                );
                GenerationCandidate::from_output(source, output)
            }
            Err(e) => {
                warn!(backend = %source, error = %e, "Backend call failed; using placeholder");
                GenerationCandidate::placeholder(source)
            }
        }
    }

    async fn try_call(&self, prompt: &str, source: &str) -> Result<ModelOutput, ModelError> {
        let backend = self.registry.resolve(source)?;
        let limit = Duration::from_millis(self.config.call_timeout_ms);
        tokio::time::timeout(limit, backend.generate(prompt))
            .await
            .map_err(|_| ModelError::Timeout {
                backend: source.to_string(),
                timeout_ms: self.config.call_timeout_ms,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelBackend;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    enum Behaviour {
        Fail,
        Hang,
        Invalid,
        Fixed(&'static str, f64),
    }

    struct ScriptedBackend {
        name: &'static str,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "scripted-1"
        }

        fn description(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> Result<ModelOutput, ModelError> {
            let (smiles, confidence) = match self.behaviour {
                Behaviour::Fail => return Err(ModelError::Api { status: 500, message: "boom".into() }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    ("CCO", 0.5)
                }
                Behaviour::Invalid => ("not a molecule", 0.9),
                Behaviour::Fixed(smiles, confidence) => (smiles, confidence),
            };
            Ok(ModelOutput {
                smiles: smiles.to_string(),
                confidence,
                execution_time_ms: 1500,
                model_version: "scripted-1".to_string(),
            })
        }

        async fn health(&self) -> Result<(), ModelError> {
            Ok(())
        }
    }

    fn orchestrator(backends: Vec<ScriptedBackend>, timeout_ms: u64) -> GenerationOrchestrator {
        let registry = backends
            .into_iter()
            .fold(BackendRegistry::builder(), |b, backend| b.register(Arc::new(backend)))
            .build();
        let config = OrchestratorConfig { call_timeout_ms: timeout_ms, ..OrchestratorConfig::default() };
        GenerationOrchestrator::new(Arc::new(registry), config)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_placeholder_shape() {
        let p = GenerationCandidate::placeholder("molt5");
        assert_eq!(p.smiles, "C");
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.execution_time, 0.0);
        assert_eq!(p.model_version, "error");
        assert!(!p.is_valid);
    }

    #[tokio::test]
    async fn test_order_and_sources_preserved() {
        let orch = orchestrator(
            vec![
                ScriptedBackend { name: "your_model", behaviour: Behaviour::Fixed("CCO", 0.9) },
                ScriptedBackend { name: "molt5", behaviour: Behaviour::Fixed("c1ccccc1", 0.8) },
            ],
            1_000,
        );
        let batch = orch.generate("x", &names(&["MolT5", "primary-model", "molt5"])).await;
        let sources: Vec<&str> = batch.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["molt5", "your_model", "molt5"]);
        assert_eq!(batch[1].smiles, "CCO");
        assert_eq!(batch[1].execution_time, 1.5);
        assert!(batch.iter().all(|c| c.is_valid));
    }

    #[tokio::test]
    async fn test_failures_become_placeholders() {
        let orch = orchestrator(
            vec![
                ScriptedBackend { name: "your_model", behaviour: Behaviour::Fail },
                ScriptedBackend { name: "molt5", behaviour: Behaviour::Hang },
            ],
            100,
        );
        let batch = orch.generate("x", &names(&["your_model", "molt5", "unknown"])).await;
        assert_eq!(batch.len(), 3);
        for candidate in &batch {
            assert!(!candidate.is_valid);
            assert_eq!(candidate.confidence, 0.0);
            assert_eq!(candidate.model_version, "error");
        }
        assert_eq!(batch[2].source, "unknown");
    }

    #[tokio::test]
    async fn test_invalid_output_is_kept_but_flagged() {
        let orch = orchestrator(
            vec![ScriptedBackend { name: "chemberta", behaviour: Behaviour::Invalid }],
            1_000,
        );
        let batch = orch.generate("x", &names(&["chemberta"])).await;
        assert_eq!(batch[0].smiles, "not a molecule");
        assert_eq!(batch[0].model_version, "scripted-1");
        assert_eq!(batch[0].confidence, 0.0);
        assert!(!batch[0].is_valid);
    }

    #[tokio::test]
    async fn test_empty_request_uses_default() {
        let orch = orchestrator(
            vec![ScriptedBackend { name: "your_model", behaviour: Behaviour::Fixed("CCO", 0.9) }],
            1_000,
        );
        let implicit = orch.generate("x", &[]).await;
        let explicit = orch.generate("x", &names(&[DEFAULT_BACKEND])).await;
        assert_eq!(implicit, explicit);
        assert_eq!(implicit.len(), 1);
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let orch = orchestrator(
            vec![
                ScriptedBackend { name: "your_model", behaviour: Behaviour::Hang },
                ScriptedBackend { name: "molt5", behaviour: Behaviour::Hang },
                ScriptedBackend { name: "chemberta", behaviour: Behaviour::Hang },
            ],
            300,
        );
        let start = std::time::Instant::now();
        let batch = orch.generate("x", &names(&["your_model", "molt5", "chemberta"])).await;
        assert_eq!(batch.len(), 3);
        // Sequential timeouts would take at least 900 ms.
        assert!(start.elapsed() < Duration::from_millis(800));
    }
}
