//! End-to-end docking: SMILES in, aligned ligand and heuristic score out.
//!
//! Runs offline against the placeholder target structure.

use chemforge_molecules::conformer::Conformer;
use chemforge_molecules::docking::{DockingConfig, DockingEngine, DockingError};
use chemforge_molecules::embed::{ConformerEmbedder, EmbedOutcome};
use chemforge_molecules::targets::{StructureSource, TargetStructureProvider, TargetTable};
use chemforge_molecules::{parse_smiles, Descriptors};

const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";

fn offline_engine(seed: Option<u64>) -> DockingEngine {
    let config = DockingConfig {
        simulated_delay_ms: 0,
        affinity_seed: seed,
        ..DockingConfig::default()
    };
    DockingEngine::new(
        config,
        ConformerEmbedder::default(),
        TargetStructureProvider::offline(TargetTable::default()),
    )
}

fn assert_close(a: [f64; 3], b: [f64; 3], tolerance: f64) {
    for axis in 0..3 {
        assert!((a[axis] - b[axis]).abs() < tolerance, "{:?} != {:?}", a, b);
    }
}

#[tokio::test]
async fn test_docked_centroid_matches_active_site() {
    let engine = offline_engine(None);
    for target in TargetTable::default().iter() {
        let result = engine.dock(ASPIRIN, &target.id).await.unwrap();
        assert_close(result.conformer.centroid(), target.center, 1e-4);
        assert_eq!(result.pdb_id, target.pdb_id);
        assert_eq!(result.structure_source, StructureSource::Placeholder);
    }
}

#[tokio::test]
async fn test_aspirin_affinity_and_breakdown() {
    let result = offline_engine(None).dock(ASPIRIN, "covid_protease").await.unwrap();

    // -5 - 0.005 * 180.04 = -5.90; perturbation in [-1.5, 0.5]
    assert!(result.affinity >= -7.41 && result.affinity <= -5.39, "{}", result.affinity);

    let parts = result.score_breakdown;
    let total = parts.van_der_waals + parts.electrostatic + parts.desolvation;
    assert!((total - result.affinity).abs() < 0.011);

    // 13 heavy atoms + 8 hydrogens
    assert_eq!(result.conformer.len(), 21);
    assert_eq!(result.ligand_pdb.lines().filter(|l| l.starts_with("HETATM")).count(), 21);
    assert!(result.target_pdb.contains("ALA"));
}

#[tokio::test]
async fn test_seeded_docking_is_reproducible() {
    let engine = offline_engine(Some(42));
    let first = engine.dock(ASPIRIN, "hiv_protease").await.unwrap();
    let second = engine.dock(ASPIRIN, "hiv_protease").await.unwrap();
    assert_eq!(first.affinity, second.affinity);
    assert_eq!(first.conformer, second.conformer);
}

#[tokio::test]
async fn test_unknown_target() {
    let err = offline_engine(None).dock(ASPIRIN, "unknown_target_xyz").await.unwrap_err();
    assert!(matches!(err, DockingError::UnknownTarget(_)));
}

#[tokio::test]
async fn test_invalid_ligand() {
    let err = offline_engine(None).dock("not a molecule", "covid_protease").await.unwrap_err();
    assert!(matches!(err, DockingError::InvalidNotation(_)));
}

#[test]
fn test_embedding_is_deterministic_for_the_same_seed() {
    let mol = parse_smiles(ASPIRIN).unwrap().with_explicit_hydrogens();
    let embedder = ConformerEmbedder::default();
    let coords = |outcome: EmbedOutcome| -> Conformer {
        match outcome {
            EmbedOutcome::Success(embedded) => embedded.conformer,
            other => panic!("aspirin should embed, got {:?}", other),
        }
    };
    assert_eq!(coords(embedder.embed(&mol)), coords(embedder.embed(&mol)));
}

#[test]
fn test_descriptors_survive_canonicalisation() {
    let direct = Descriptors::from_molecule(&parse_smiles(ASPIRIN).unwrap());
    let reparsed = Descriptors::from_molecule(&parse_smiles(&direct.canonical_smiles).unwrap());
    assert_eq!(direct, reparsed);
}
