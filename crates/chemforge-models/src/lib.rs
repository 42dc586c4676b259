//! chemforge-models — generation backends and multi-backend orchestration.
//!
//! A prompt is fanned out to every requested backend concurrently; each
//! backend contributes exactly one candidate, with failures replaced by
//! placeholders.

pub mod backend;
pub mod registry;
pub mod orchestrator;

pub use backend::{HttpModelBackend, ModelBackend, ModelError, ModelOutput, TemplateBackend};
pub use orchestrator::{GenerationCandidate, GenerationOrchestrator, OrchestratorConfig};
pub use registry::{normalize_backend_name, BackendRegistry, ModelInfo, DEFAULT_BACKEND};
