//! Conformer embedding.
//!
//! Coordinates are produced by a light distance-geometry scheme: random
//! starting positions inside a box that scales with the atom count, then
//! gradient descent on bond lengths, 1-3 distances and non-bonded lower
//! bounds. The first attempt is seeded so identical input gives identical
//! geometry; later attempts use entropy. A feasible geometry is then tidied
//! with the force field. When nothing feasible comes out the caller gets a
//! flat 2D layout flagged as degraded.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conformer::{norm, sub, Conformer, Point};
use crate::forcefield::{ideal_angle, ideal_bond_length, steepest_descent, stretch, topological_distances, ForceField};
use crate::molecule::Molecule;

const BOND_WEIGHT: f64 = 10.0;
const ANGLE_WEIGHT: f64 = 2.0;
const LOWER_BOUND_WEIGHT: f64 = 5.0;
/// Fraction of the vdW contact distance kept between atoms three or more bonds apart.
const LOWER_BOUND_SCALE: f64 = 0.65;
/// Bond length used by the 2D fallback layout.
const LAYOUT_SPACING: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Seed for the first, reproducible attempt.
    pub seed: u64,
    /// Gradient-descent iterations per attempt.
    pub max_iterations: usize,
    /// Entropy-seeded attempts after the seeded one fails.
    pub random_attempts: usize,
    /// Largest acceptable RMS deviation of bond lengths, in Å.
    pub bond_tolerance: f64,
    pub max_atoms: usize,
    /// Run force-field refinement on a feasible geometry.
    pub minimize: bool,
    pub minimizer_iterations: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iterations: 2000,
            random_attempts: 3,
            bond_tolerance: 0.15,
            max_atoms: 500,
            minimize: true,
            minimizer_iterations: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStrategy {
    Seeded,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedConformer {
    pub conformer: Conformer,
    pub strategy: EmbedStrategy,
    /// Force-field refinement succeeded and replaced the raw geometry.
    pub refined: bool,
    /// Embedding attempts used, including the successful one.
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedFailure {
    #[error("molecule has no atoms")]
    Empty,
    #[error("molecule has {atoms} atoms, embedding limit is {limit}")]
    TooManyAtoms { atoms: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    Success(EmbeddedConformer),
    /// No feasible 3D geometry; `layout` is a flat 2D arrangement (z = 0).
    Degraded { layout: Conformer, reason: String },
    Failed(EmbedFailure),
}

impl EmbedOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EmbedOutcome::Success(_))
    }

    /// The 3D conformer, if embedding succeeded.
    pub fn conformer(&self) -> Option<&Conformer> {
        match self {
            EmbedOutcome::Success(embedded) => Some(&embedded.conformer),
            _ => None,
        }
    }
}

/// Target distance between two atoms. Lower-bound restraints only push apart.
#[derive(Debug, Clone)]
struct Restraint {
    i: usize,
    j: usize,
    target: f64,
    weight: f64,
    lower_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConformerEmbedder {
    config: EmbedConfig,
}

impl ConformerEmbedder {
    pub fn new(config: EmbedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    pub fn embed(&self, mol: &Molecule) -> EmbedOutcome {
        let atoms = mol.atom_count();
        if atoms == 0 {
            return EmbedOutcome::Failed(EmbedFailure::Empty);
        }
        if atoms > self.config.max_atoms {
            warn!(atoms, limit = self.config.max_atoms, "Molecule too large to embed");
            return EmbedOutcome::Failed(EmbedFailure::TooManyAtoms { atoms, limit: self.config.max_atoms });
        }

        let (bonded, bounds) = restraints(mol);
        let mut attempts = 1;
        let mut found = {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            self.attempt(mol, &bonded, &bounds, &mut rng)
                .map(|coords| (coords, EmbedStrategy::Seeded))
        };

        if found.is_none() {
            debug!(seed = self.config.seed, "Seeded embedding infeasible, trying random coordinates");
        }
        while found.is_none() && attempts <= self.config.random_attempts {
            attempts += 1;
            let mut rng = StdRng::from_entropy();
            found = self
                .attempt(mol, &bonded, &bounds, &mut rng)
                .map(|coords| (coords, EmbedStrategy::Random));
        }

        let Some((conformer, strategy)) = found else {
            let reason = format!("no feasible 3D geometry after {} attempts", attempts);
            warn!(atoms, attempts, "Embedding degraded to 2D layout");
            return EmbedOutcome::Degraded { layout: flat_layout(mol), reason };
        };

        let (conformer, refined) = if self.config.minimize {
            match ForceField::new(mol).refine(&conformer, self.config.minimizer_iterations) {
                Ok(better) => (better, true),
                Err(e) => {
                    debug!(error = %e, "Refinement failed, keeping embedded geometry");
                    (conformer, false)
                }
            }
        } else {
            (conformer, false)
        };

        info!(atoms, attempts, ?strategy, refined, "Embedded conformer");
        EmbedOutcome::Success(EmbeddedConformer { conformer, strategy, refined, attempts })
    }

    /// One embedding attempt. Bonds and angles settle first, then the
    /// non-bonded bounds are switched on.
    fn attempt(
        &self,
        mol: &Molecule,
        bonded: &[Restraint],
        bounds: &[Restraint],
        rng: &mut StdRng,
    ) -> Option<Conformer> {
        let n = mol.atom_count();
        let side = f64::max(2.0, 2.5 * (n as f64).cbrt());
        let half = side / 2.0;
        let start: Vec<Point> = (0..n)
            .map(|_| {
                [
                    rng.gen_range(-half..=half),
                    rng.gen_range(-half..=half),
                    rng.gen_range(-half..=half),
                ]
            })
            .collect();

        let warmup = self.config.max_iterations / 2;
        let settled = steepest_descent(start, warmup, |x, g| restraint_energy(bonded, x, g));
        let all: Vec<Restraint> = bonded.iter().chain(bounds).cloned().collect();
        let remaining = self.config.max_iterations - warmup;
        let result = steepest_descent(settled.coords, remaining, |x, g| restraint_energy(&all, x, g));

        let conformer = Conformer::new(result.coords);
        if !conformer.is_finite() {
            return None;
        }
        let rms = bond_rms_deviation(mol, &conformer);
        debug!(rms, tolerance = self.config.bond_tolerance, "Embedding attempt finished");
        (rms <= self.config.bond_tolerance).then_some(conformer)
    }
}

/// Bond and 1-3 restraints, then non-bonded lower bounds.
fn restraints(mol: &Molecule) -> (Vec<Restraint>, Vec<Restraint>) {
    let mut bonded: Vec<Restraint> = mol
        .bonds()
        .iter()
        .map(|b| Restraint {
            i: b.begin,
            j: b.end,
            target: ideal_bond_length(mol, b),
            weight: BOND_WEIGHT,
            lower_only: false,
        })
        .collect();

    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for center in 0..mol.atom_count() {
        let theta = ideal_angle(mol, center);
        let adj = mol.adjacency(center);
        for (a, &(i, bi)) in adj.iter().enumerate() {
            for &(k, bk) in &adj[a + 1..] {
                let pair = (i.min(k), i.max(k));
                // Three-membered rings: the 1-3 pair is already bonded.
                if mol.bond_between(i, k).is_some() || !seen.insert(pair) {
                    continue;
                }
                let r1 = ideal_bond_length(mol, &mol.bonds()[bi]);
                let r2 = ideal_bond_length(mol, &mol.bonds()[bk]);
                let target = (r1 * r1 + r2 * r2 - 2.0 * r1 * r2 * theta.cos()).sqrt();
                bonded.push(Restraint { i: pair.0, j: pair.1, target, weight: ANGLE_WEIGHT, lower_only: false });
            }
        }
    }

    let topo = topological_distances(mol);
    let mut bounds = Vec::new();
    for i in 0..mol.atom_count() {
        for j in i + 1..mol.atom_count() {
            if topo[i][j] >= 3 {
                let contact = mol.atom(i).element.vdw_radius() + mol.atom(j).element.vdw_radius();
                bounds.push(Restraint {
                    i,
                    j,
                    target: LOWER_BOUND_SCALE * contact,
                    weight: LOWER_BOUND_WEIGHT,
                    lower_only: true,
                });
            }
        }
    }
    (bonded, bounds)
}

fn restraint_energy(restraints: &[Restraint], coords: &[Point], grad: &mut [Point]) -> f64 {
    grad.iter_mut().for_each(|g| *g = [0.0; 3]);
    restraints
        .iter()
        .map(|r| stretch(coords, grad, r.i, r.j, r.target, r.weight, r.lower_only))
        .sum()
}

/// RMS deviation of bond lengths from their ideal values; zero without bonds.
pub fn bond_rms_deviation(mol: &Molecule, conformer: &Conformer) -> f64 {
    if mol.bond_count() == 0 {
        return 0.0;
    }
    let sum: f64 = mol
        .bonds()
        .iter()
        .map(|b| {
            let d = norm(sub(conformer.coords()[b.begin], conformer.coords()[b.end]));
            (d - ideal_bond_length(mol, b)).powi(2)
        })
        .sum();
    (sum / mol.bond_count() as f64).sqrt()
}

/// Breadth-first 2D layout: x follows the depth from the component root,
/// y the order within that depth; components are stacked along y.
pub fn flat_layout(mol: &Molecule) -> Conformer {
    let n = mol.atom_count();
    let mut coords = vec![[0.0; 3]; n];
    let mut placed = vec![false; n];
    let mut row_offset = 0.0;

    for root in 0..n {
        if placed[root] {
            continue;
        }
        let mut per_depth: Vec<usize> = Vec::new();
        let mut queue = VecDeque::from([(root, 0usize)]);
        placed[root] = true;
        while let Some((u, depth)) = queue.pop_front() {
            if per_depth.len() <= depth {
                per_depth.push(0);
            }
            let slot = per_depth[depth];
            per_depth[depth] += 1;
            coords[u] = [depth as f64 * LAYOUT_SPACING, row_offset + slot as f64 * LAYOUT_SPACING, 0.0];
            for v in mol.neighbors(u) {
                if !placed[v] {
                    placed[v] = true;
                    queue.push_back((v, depth + 1));
                }
            }
        }
        let widest = per_depth.iter().copied().max().unwrap_or(1);
        row_offset += (widest as f64 + 1.0) * LAYOUT_SPACING;
    }
    Conformer::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{Atom, Bond, BondOrder};
    use crate::elements::Element;
    use crate::smiles::parse_smiles;

    fn with_h(s: &str) -> Molecule {
        parse_smiles(s).unwrap().with_explicit_hydrogens()
    }

    #[test]
    fn test_seeded_embedding_is_reproducible() {
        let mol = with_h("CCO");
        let embedder = ConformerEmbedder::default();
        let first = embedder.embed(&mol);
        let second = embedder.embed(&mol);
        match (&first, &second) {
            (EmbedOutcome::Success(a), EmbedOutcome::Success(b)) => {
                assert_eq!(a.strategy, EmbedStrategy::Seeded);
                assert_eq!(a.attempts, 1);
                assert_eq!(a.conformer, b.conformer);
                assert_eq!(a.conformer.len(), mol.atom_count());
            }
            other => panic!("expected two successes, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_geometry_is_sensible() {
        let mol = with_h("c1ccccc1");
        let outcome = ConformerEmbedder::default().embed(&mol);
        let conformer = outcome.conformer().expect("benzene embeds");
        assert!(conformer.is_finite());
        assert!(!conformer.is_flat());
        assert!(bond_rms_deviation(&mol, conformer) <= 0.15);
        for b in mol.bonds() {
            let d = conformer.distance(b.begin, b.end);
            assert!(d > 0.8 && d < 1.8, "bond length {} out of range", d);
        }
    }

    #[test]
    fn test_without_refinement() {
        let mol = with_h("CC(=O)O");
        let config = EmbedConfig { minimize: false, ..EmbedConfig::default() };
        match ConformerEmbedder::new(config).embed(&mol) {
            EmbedOutcome::Success(embedded) => assert!(!embedded.refined),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_degraded_when_no_iterations() {
        let mol = with_h("CCO");
        let config = EmbedConfig { max_iterations: 0, random_attempts: 1, ..EmbedConfig::default() };
        match ConformerEmbedder::new(config).embed(&mol) {
            EmbedOutcome::Degraded { layout, reason } => {
                assert_eq!(layout.len(), mol.atom_count());
                assert!(layout.is_flat());
                assert!(reason.contains("2 attempts"), "{}", reason);
            }
            other => panic!("expected degraded outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_outcomes() {
        let empty = Molecule::new(vec![], vec![]);
        assert_eq!(
            ConformerEmbedder::default().embed(&empty),
            EmbedOutcome::Failed(EmbedFailure::Empty)
        );

        let atoms = vec![Atom::new(Element::C), Atom::new(Element::C), Atom::new(Element::C)];
        let bonds = vec![Bond::new(0, 1, BondOrder::Single), Bond::new(1, 2, BondOrder::Single)];
        let config = EmbedConfig { max_atoms: 2, ..EmbedConfig::default() };
        assert_eq!(
            ConformerEmbedder::new(config).embed(&Molecule::new(atoms, bonds)),
            EmbedOutcome::Failed(EmbedFailure::TooManyAtoms { atoms: 3, limit: 2 })
        );
    }

    #[test]
    fn test_flat_layout_separates_atoms() {
        let mol = parse_smiles("CC(C)C.O").unwrap();
        let layout = flat_layout(&mol);
        for i in 0..mol.atom_count() {
            for j in i + 1..mol.atom_count() {
                assert!(layout.distance(i, j) > 1.0);
            }
        }
    }
}
