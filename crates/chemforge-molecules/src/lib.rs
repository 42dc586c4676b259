//! Chemforge Molecules - structure validation, 3D embedding and docking.
//!
//! 1. Parsing and validating SMILES into a molecular graph
//! 2. Canonical SMILES and descriptors
//! 3. Embedding 3D conformers with force-field refinement
//! 4. Resolving docking targets and their reference structures
//! 5. Rigid docking with a heuristic affinity score

pub mod elements;
pub mod error;
pub mod molecule;
pub mod smiles;
pub mod canonical;
pub mod descriptors;
pub mod conformer;
pub mod forcefield;
pub mod embed;
pub mod export;
pub mod pdb;
pub mod targets;
pub mod scoring;
pub mod docking;

pub use canonical::canonical_smiles;
pub use conformer::Conformer;
pub use descriptors::{validate_smiles, Descriptors, SmilesValidation};
pub use docking::{DockingConfig, DockingEngine, DockingError, DockingResult};
pub use embed::{ConformerEmbedder, EmbedConfig, EmbedOutcome};
pub use error::MoleculeError;
pub use export::{structure_3d, StructureBlock};
pub use molecule::Molecule;
pub use smiles::parse_smiles;
pub use targets::{DockingTarget, FetchPolicy, StructureSource, TargetStructureProvider, TargetTable};
