//! Rigid docking of a ligand into a target's active site.
//!
//! The ligand is embedded in 3D, translated so its centroid sits on the
//! target's active-site centre (no rotation, no clash handling) and given a
//! heuristic affinity score.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use chemforge_common::ErrorKind;

use crate::conformer::{sub, Conformer};
use crate::descriptors::exact_mass;
use crate::embed::{ConformerEmbedder, EmbedOutcome, EmbedStrategy};
use crate::error::MoleculeError;
use crate::export::to_pdb_block;
use crate::scoring::{AffinityScorer, ScoreBreakdown};
use crate::smiles::parse_smiles;
use crate::targets::{StructureSource, TargetStructureProvider};

#[derive(Debug, Error)]
pub enum DockingError {
    #[error(transparent)]
    InvalidNotation(#[from] MoleculeError),

    #[error("Unknown docking target '{0}'")]
    UnknownTarget(String),

    #[error("No 3D geometry available for ligand: {0}")]
    EmbeddingUnavailable(String),

    #[error("Fetching structure {pdb_id} failed: {reason}")]
    TargetFetchFailed { pdb_id: String, reason: String },

    #[error("Docking worker failed: {0}")]
    Worker(String),
}

impl DockingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockingError::InvalidNotation(_) => ErrorKind::Validation,
            DockingError::UnknownTarget(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockingConfig {
    /// Pause before returning a result, in milliseconds.
    pub simulated_delay_ms: u64,
    /// Seed for the affinity perturbation; unseeded when absent.
    pub affinity_seed: Option<u64>,
    /// Bounds of the uniform affinity perturbation, kcal/mol.
    pub perturbation: [f64; 2],
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            simulated_delay_ms: 1000,
            affinity_seed: None,
            perturbation: [-1.5, 0.5],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DockingResult {
    pub target_id: String,
    pub target_name: String,
    pub pdb_id: String,
    pub ligand_smiles: String,
    pub affinity: f64,
    pub score_breakdown: ScoreBreakdown,
    /// Ligand with explicit hydrogens, translated into the active site.
    pub conformer: Conformer,
    pub ligand_pdb: String,
    pub target_pdb: String,
    pub structure_source: StructureSource,
    pub embedding: EmbedStrategy,
}

pub struct DockingEngine {
    embedder: ConformerEmbedder,
    provider: TargetStructureProvider,
    scorer: AffinityScorer,
    delay: Duration,
}

impl DockingEngine {
    pub fn new(config: DockingConfig, embedder: ConformerEmbedder, provider: TargetStructureProvider) -> Self {
        let [low, high] = config.perturbation;
        Self {
            embedder,
            provider,
            scorer: AffinityScorer::new((low, high), config.affinity_seed),
            delay: Duration::from_millis(config.simulated_delay_ms),
        }
    }

    pub fn provider(&self) -> &TargetStructureProvider {
        &self.provider
    }

    pub async fn dock(&self, ligand_smiles: &str, target_id: &str) -> Result<DockingResult, DockingError> {
        let molecule = parse_smiles(ligand_smiles)?.with_explicit_hydrogens();
        // Fail fast on unknown targets before spending time on embedding.
        self.provider.target(target_id)?;

        let embedder = self.embedder.clone();
        let (molecule, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = embedder.embed(&molecule);
            (molecule, outcome)
        })
        .await
        .map_err(|e| DockingError::Worker(e.to_string()))?;

        let embedded = match outcome {
            EmbedOutcome::Success(embedded) => embedded,
            EmbedOutcome::Degraded { reason, .. } => return Err(DockingError::EmbeddingUnavailable(reason)),
            EmbedOutcome::Failed(failure) => {
                return Err(DockingError::EmbeddingUnavailable(failure.to_string()))
            }
        };

        let resolved = self.provider.resolve(target_id).await?;

        let centroid = embedded.conformer.centroid();
        let shift = sub(resolved.target.center, centroid);
        let conformer = embedded.conformer.translated(shift);
        debug!(?centroid, ?shift, "Translated ligand into active site");

        let mass = exact_mass(&molecule);
        let score = self.scorer.score(mass);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        info!(
            target = %resolved.target.id,
            affinity = score.affinity,
            source = ?resolved.source,
            "Docking complete"
        );

        Ok(DockingResult {
            target_id: resolved.target.id,
            target_name: resolved.target.name,
            pdb_id: resolved.target.pdb_id,
            ligand_smiles: ligand_smiles.to_string(),
            affinity: score.affinity,
            score_breakdown: score.breakdown,
            ligand_pdb: to_pdb_block(&molecule, &conformer),
            conformer,
            target_pdb: resolved.structure,
            structure_source: resolved.source,
            embedding: embedded.strategy,
        })
    }
}
