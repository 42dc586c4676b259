//! Docking targets and their reference structures.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::docking::DockingError;
use crate::pdb::StructureFetcher;

/// Five-atom alanine fragment served when the real structure is unavailable.
pub const PLACEHOLDER_PROTEIN_PDB: &str = "\
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  CA  ALA A   1       1.458   0.000   0.000  1.00  0.00           C
ATOM      3  C   ALA A   1       2.009   1.396   0.000  1.00  0.00           C
ATOM      4  O   ALA A   1       1.272   2.432   0.000  1.00  0.00           O
ATOM      5  CB  ALA A   1       2.000  -0.767   1.217  1.00  0.00           C
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingTarget {
    pub id: String,
    pub pdb_id: String,
    pub name: String,
    /// Active-site centre in the structure's frame, in Å.
    pub center: [f64; 3],
}

impl DockingTarget {
    pub fn new(id: &str, pdb_id: &str, name: &str, center: [f64; 3]) -> Self {
        Self { id: id.to_string(), pdb_id: pdb_id.to_string(), name: name.to_string(), center }
    }
}

#[derive(Debug, Error)]
pub enum TargetTableError {
    #[error("reading target table: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing target table: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid target table: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct TargetFile {
    targets: Vec<DockingTarget>,
}

/// The preset targets. Fixed after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTable {
    targets: Vec<DockingTarget>,
}

impl Default for TargetTable {
    fn default() -> Self {
        Self {
            targets: vec![
                DockingTarget::new("covid_protease", "6LU7", "SARS-CoV-2 Main Protease", [-10.7, 12.4, 68.8]),
                DockingTarget::new("hiv_protease", "1HSG", "HIV-1 Protease", [16.0, 26.0, 5.0]),
                DockingTarget::new("breast_cancer", "3ERT", "Estrogen Receptor Alpha", [30.0, -2.0, 25.0]),
            ],
        }
    }
}

impl TargetTable {
    pub fn new(targets: Vec<DockingTarget>) -> Result<Self, TargetTableError> {
        if targets.is_empty() {
            return Err(TargetTableError::Invalid("no targets".into()));
        }
        let mut ids = HashSet::new();
        for t in &targets {
            if !ids.insert(t.id.as_str()) {
                return Err(TargetTableError::Invalid(format!("duplicate target id '{}'", t.id)));
            }
            if t.center.iter().any(|c| !c.is_finite()) {
                return Err(TargetTableError::Invalid(format!("target '{}' has a non-finite centre", t.id)));
            }
        }
        Ok(Self { targets })
    }

    /// ```yaml
    /// targets:
    ///   - id: covid_protease
    ///     pdb_id: 6LU7
    ///     name: SARS-CoV-2 Main Protease
    ///     center: [-10.7, 12.4, 68.8]
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TargetTableError> {
        let file: TargetFile = serde_yaml::from_str(yaml)?;
        Self::new(file.targets)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, TargetTableError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_yaml_str(&text)?;
        info!(path = %path.as_ref().display(), targets = table.len(), "Loaded target table");
        Ok(table)
    }

    pub fn get(&self, id: &str) -> Option<&DockingTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DockingTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// What to do when a reference structure cannot be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Serve the placeholder fragment and mark the result.
    #[default]
    Placeholder,
    /// Fail the request with `TargetFetchFailed`.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureSource {
    Downloaded,
    Cached,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget {
    pub target: DockingTarget,
    pub structure: String,
    pub source: StructureSource,
}

/// Resolves target ids to their reference structures.
#[derive(Debug, Clone)]
pub struct TargetStructureProvider {
    table: TargetTable,
    /// `None` when network access is disabled.
    fetcher: Option<StructureFetcher>,
    policy: FetchPolicy,
}

impl TargetStructureProvider {
    pub fn new(table: TargetTable, fetcher: Option<StructureFetcher>, policy: FetchPolicy) -> Self {
        Self { table, fetcher, policy }
    }

    /// Never touches the network; every structure is the placeholder.
    pub fn offline(table: TargetTable) -> Self {
        Self::new(table, None, FetchPolicy::Placeholder)
    }

    pub fn table(&self) -> &TargetTable {
        &self.table
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub fn target(&self, target_id: &str) -> Result<&DockingTarget, DockingError> {
        self.table
            .get(target_id)
            .ok_or_else(|| DockingError::UnknownTarget(target_id.to_string()))
    }

    pub async fn resolve(&self, target_id: &str) -> Result<ResolvedTarget, DockingError> {
        let target = self.target(target_id)?.clone();

        let fetched = match &self.fetcher {
            Some(fetcher) => fetcher.fetch_pdb(&target.pdb_id).await.map_err(|e| format!("{:#}", e)),
            None => Err("network access disabled".to_string()),
        };

        match (fetched, self.policy) {
            (Ok(structure), _) => {
                let source = if structure.from_cache {
                    StructureSource::Cached
                } else {
                    StructureSource::Downloaded
                };
                Ok(ResolvedTarget { target, structure: structure.text, source })
            }
            (Err(reason), FetchPolicy::Placeholder) => {
                warn!(target = %target.id, pdb = %target.pdb_id, reason = %reason, "Using placeholder structure");
                Ok(ResolvedTarget {
                    target,
                    structure: PLACEHOLDER_PROTEIN_PDB.to_string(),
                    source: StructureSource::Placeholder,
                })
            }
            (Err(reason), FetchPolicy::Strict) => Err(DockingError::TargetFetchFailed {
                pdb_id: target.pdb_id,
                reason,
            }),
        }
    }
}
