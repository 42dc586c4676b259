//! Backend registry: name resolution, health probing and the model catalogue.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::{ModelBackend, ModelError, TemplateBackend};

/// Backend used when a request names none.
pub const DEFAULT_BACKEND: &str = "your_model";

/// Accepted spellings → canonical backend name. Lookup is on the lowercased name.
const ALIASES: &[(&str, &str)] = &[
    ("your_model", "your_model"),
    ("primary-model", "your_model"),
    ("primary_model", "your_model"),
    ("model_a", "your_model"),
    ("molt5", "molt5"),
    ("auxiliary-model-a", "molt5"),
    ("model_b", "molt5"),
    ("chemberta", "chemberta"),
    ("auxiliary-model-b", "chemberta"),
    ("model_c", "chemberta"),
];

/// Lowercase `name` and map legacy aliases onto canonical backend names.
/// Unmapped names come back lowercased.
pub fn normalize_backend_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// `your_model` → `Your Model`.
fn display_name(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// One catalogue entry, as listed by the `models` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub is_available: bool,
}

/// The fixed set of generation backends, built once and shared by `Arc`.
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn ModelBackend>>,
    health_timeout: Duration,
}

pub struct BackendRegistryBuilder {
    backends: BTreeMap<String, Arc<dyn ModelBackend>>,
    health_timeout: Duration,
}

impl Default for BackendRegistryBuilder {
    fn default() -> Self {
        Self {
            backends: BTreeMap::new(),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl BackendRegistryBuilder {
    /// Registers under the backend's normalized name; a later registration
    /// with the same name replaces the earlier one.
    pub fn register(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        let name = normalize_backend_name(backend.name());
        if self.backends.insert(name.clone(), backend).is_some() {
            warn!(backend = %name, "Backend registered twice; keeping the last one");
        }
        self
    }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn build(self) -> BackendRegistry {
        info!(backends = ?self.backends.keys().collect::<Vec<_>>(), "Backend registry ready");
        BackendRegistry {
            backends: self.backends,
            health_timeout: self.health_timeout,
        }
    }
}

impl BackendRegistry {
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// The three canonical backends served by the offline template model.
    pub fn with_offline_defaults() -> Self {
        Self::builder()
            .register(Arc::new(offline_backend(DEFAULT_BACKEND)))
            .register(Arc::new(offline_backend("molt5")))
            .register(Arc::new(offline_backend("chemberta")))
            .build()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ModelBackend>, ModelError> {
        let canonical = normalize_backend_name(name);
        self.backends
            .get(&canonical)
            .cloned()
            .ok_or(ModelError::UnknownBackend(canonical))
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Probe every backend concurrently. A failed or timed-out probe reports
    /// `false` for that backend only.
    pub async fn health(&self) -> BTreeMap<String, bool> {
        let probes = self.backends.iter().map(|(name, backend)| async move {
            let healthy = match tokio::time::timeout(self.health_timeout, backend.health()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(backend = %name, error = %e, "Health check failed");
                    false
                }
                Err(_) => {
                    warn!(
                        backend = %name,
                        timeout_ms = self.health_timeout.as_millis() as u64,
                        "Health check timed out"
                    );
                    false
                }
            };
            debug!(backend = %name, healthy, "Health probe");
            (name.clone(), healthy)
        });
        join_all(probes).await.into_iter().collect()
    }

    pub async fn catalogue(&self) -> Vec<ModelInfo> {
        let health = self.health().await;
        self.backends
            .iter()
            .map(|(name, backend)| ModelInfo {
                name: name.clone(),
                display_name: display_name(name),
                description: backend.description().to_string(),
                version: backend.version().to_string(),
                is_available: health.get(name).copied().unwrap_or(false),
            })
            .collect()
    }
}

/// Human-readable description for the known backends.
pub fn backend_description(name: &str) -> &'static str {
    match name {
        "your_model" => "Custom text-to-molecule model trained on your dataset",
        "molt5" => "MolT5 - transformer model for molecular language understanding",
        "chemberta" => "ChemBERTa - BERT-based model pretrained on SMILES",
        _ => "AI model for molecule generation",
    }
}

/// Template stand-in for one of the canonical backends.
pub fn offline_backend(name: &str) -> TemplateBackend {
    let confidence = match name {
        "your_model" => 0.92,
        "molt5" => 0.85,
        "chemberta" => 0.78,
        _ => 0.7,
    };
    TemplateBackend::new(name, backend_description(name), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelOutput;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StubBackend {
        name: &'static str,
        healthy: bool,
        hang: bool,
    }

    #[async_trait]
    impl ModelBackend for StubBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "stub"
        }

        fn description(&self) -> &str {
            "stub backend"
        }

        async fn generate(&self, _prompt: &str) -> Result<ModelOutput, ModelError> {
            Err(ModelError::BackendCallFailed("stub".into()))
        }

        async fn health(&self) -> Result<(), ModelError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.healthy {
                Ok(())
            } else {
                Err(ModelError::Api { status: 503, message: "down".into() })
            }
        }
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_backend_name("primary-model"), "your_model");
        assert_eq!(normalize_backend_name("Primary_Model"), "your_model");
        assert_eq!(normalize_backend_name("MODEL_A"), "your_model");
        assert_eq!(normalize_backend_name("auxiliary-model-a"), "molt5");
        assert_eq!(normalize_backend_name("model_b"), "molt5");
        assert_eq!(normalize_backend_name("auxiliary-model-b"), "chemberta");
        assert_eq!(normalize_backend_name("model_c"), "chemberta");
        assert_eq!(normalize_backend_name("SomethingElse"), "somethingelse");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("your_model"), "Your Model");
        assert_eq!(display_name("molt5"), "Molt5");
        assert_eq!(display_name("chemberta"), "Chemberta");
    }

    #[test]
    fn test_resolve() {
        let registry = BackendRegistry::with_offline_defaults();
        assert_eq!(registry.names(), vec!["chemberta", "molt5", "your_model"]);
        assert_eq!(registry.resolve("Model_B").unwrap().name(), "molt5");
        match registry.resolve("Nonexistent") {
            Err(ModelError::UnknownBackend(name)) => assert_eq!(name, "nonexistent"),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("resolved an unknown backend"),
        }
    }

    #[tokio::test]
    async fn test_health_isolates_failures() {
        let registry = BackendRegistry::builder()
            .register(Arc::new(StubBackend { name: "your_model", healthy: true, hang: false }))
            .register(Arc::new(StubBackend { name: "molt5", healthy: false, hang: false }))
            .register(Arc::new(StubBackend { name: "chemberta", healthy: true, hang: true }))
            .health_timeout(Duration::from_millis(100))
            .build();

        let health = registry.health().await;
        assert_eq!(health.len(), 3);
        assert_eq!(health["your_model"], true);
        assert_eq!(health["molt5"], false);
        assert_eq!(health["chemberta"], false);
    }

    #[tokio::test]
    async fn test_catalogue() {
        let catalogue = BackendRegistry::with_offline_defaults().catalogue().await;
        assert_eq!(catalogue.len(), 3);
        let primary = catalogue.iter().find(|m| m.name == "your_model").unwrap();
        assert_eq!(primary.display_name, "Your Model");
        assert_eq!(primary.version, "template-1.0");
        assert!(primary.is_available);
        assert!(primary.description.starts_with("Custom"));
    }
}
