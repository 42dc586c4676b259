//! A small valence force field used to tidy embedded geometries.
//!
//! Terms: harmonic bond stretch, cosine-harmonic angle bend and a soft
//! repulsion between atoms three or more bonds apart. Parameters come from
//! covalent radii and a coarse hybridisation guess, which is enough to
//! remove distortions left by the distance-geometry stage. This is not a
//! physically parameterised force field.

use thiserror::Error;
use tracing::debug;

use crate::conformer::{dot, norm, scale, sub, Conformer, Point};
use crate::molecule::{Bond, BondOrder, Molecule};

const BOND_K: f64 = 300.0;
const ANGLE_K: f64 = 50.0;
const REPULSION_K: f64 = 10.0;
/// Non-bonded atoms are pushed apart until this fraction of their vdW contact distance.
const REPULSION_SCALE: f64 = 0.75;

const INITIAL_STEP: f64 = 0.1;
const MAX_STEP: f64 = 0.5;
const MIN_STEP: f64 = 1e-7;
const GRADIENT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefineError {
    #[error("force-field energy is not finite")]
    NonFinite,
    #[error("force-field energy increased from {before:.3} to {after:.3}")]
    EnergyIncreased { before: f64, after: f64 },
    #[error("conformer has {conformer} atoms but molecule has {molecule}")]
    SizeMismatch { conformer: usize, molecule: usize },
}

/// Ideal bond length from covalent radii, shortened for multiple bonds.
pub fn ideal_bond_length(mol: &Molecule, bond: &Bond) -> f64 {
    let factor = match bond.order {
        BondOrder::Single => 1.0,
        BondOrder::Aromatic => 0.93,
        BondOrder::Double => 0.87,
        BondOrder::Triple => 0.78,
    };
    let a = mol.atom(bond.begin).element.covalent_radius();
    let b = mol.atom(bond.end).element.covalent_radius();
    (a + b) * factor
}

/// Ideal bond angle (radians) at `center` from its bond orders:
/// linear for sp, trigonal for sp2 and aromatic atoms, tetrahedral otherwise.
pub fn ideal_angle(mol: &Molecule, center: usize) -> f64 {
    let orders: Vec<BondOrder> = mol
        .adjacency(center)
        .iter()
        .map(|&(_, bi)| mol.bonds()[bi].order)
        .collect();
    let doubles = orders.iter().filter(|&&o| o == BondOrder::Double).count();
    let degrees = if orders.contains(&BondOrder::Triple) || doubles >= 2 {
        180.0
    } else if doubles == 1 || orders.contains(&BondOrder::Aromatic) || mol.atom(center).aromatic {
        120.0
    } else {
        109.47
    };
    f64::to_radians(degrees)
}

/// Shortest-path bond counts from every atom; `usize::MAX` between components.
pub(crate) fn topological_distances(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    let mut all = Vec::with_capacity(n);
    for start in 0..n {
        let mut dist = vec![usize::MAX; n];
        dist[start] = 0;
        let mut queue = std::collections::VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for v in mol.neighbors(u) {
                if dist[v] == usize::MAX {
                    dist[v] = dist[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        all.push(dist);
    }
    all
}

#[derive(Debug, Clone)]
struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
}

#[derive(Debug, Clone)]
struct AngleTerm {
    i: usize,
    center: usize,
    k: usize,
    cos0: f64,
}

#[derive(Debug, Clone)]
struct RepulsionTerm {
    i: usize,
    j: usize,
    r_min: f64,
}

#[derive(Debug, Clone)]
pub struct ForceField {
    atoms: usize,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    repulsions: Vec<RepulsionTerm>,
}

impl ForceField {
    pub fn new(mol: &Molecule) -> Self {
        let bonds = mol
            .bonds()
            .iter()
            .map(|b| BondTerm { i: b.begin, j: b.end, r0: ideal_bond_length(mol, b) })
            .collect();

        let mut angles = Vec::new();
        for center in 0..mol.atom_count() {
            let neighbours: Vec<usize> = mol.neighbors(center).collect();
            let cos0 = ideal_angle(mol, center).cos();
            for (a, &i) in neighbours.iter().enumerate() {
                for &k in &neighbours[a + 1..] {
                    angles.push(AngleTerm { i, center, k, cos0 });
                }
            }
        }

        let topo = topological_distances(mol);
        let mut repulsions = Vec::new();
        for i in 0..mol.atom_count() {
            for j in i + 1..mol.atom_count() {
                if topo[i][j] >= 3 {
                    let contact = mol.atom(i).element.vdw_radius() + mol.atom(j).element.vdw_radius();
                    repulsions.push(RepulsionTerm { i, j, r_min: REPULSION_SCALE * contact });
                }
            }
        }

        Self { atoms: mol.atom_count(), bonds, angles, repulsions }
    }

    pub fn energy(&self, coords: &[Point]) -> f64 {
        let mut scratch = vec![[0.0; 3]; coords.len()];
        self.energy_and_gradient(coords, &mut scratch)
    }

    /// Total energy; `grad` is overwritten with dE/dx.
    pub fn energy_and_gradient(&self, coords: &[Point], grad: &mut [Point]) -> f64 {
        grad.iter_mut().for_each(|g| *g = [0.0; 3]);
        let mut energy = 0.0;

        for t in &self.bonds {
            energy += stretch(coords, grad, t.i, t.j, t.r0, BOND_K, false);
        }
        for t in &self.repulsions {
            energy += stretch(coords, grad, t.i, t.j, t.r_min, REPULSION_K, true);
        }
        for t in &self.angles {
            energy += bend(coords, grad, t);
        }
        energy
    }

    /// Minimize a conformer. The result never has a higher energy than the input.
    pub fn refine(&self, conformer: &Conformer, max_iterations: usize) -> Result<Conformer, RefineError> {
        if conformer.len() != self.atoms {
            return Err(RefineError::SizeMismatch { conformer: conformer.len(), molecule: self.atoms });
        }
        let before = self.energy(conformer.coords());
        if !before.is_finite() {
            return Err(RefineError::NonFinite);
        }

        let result = steepest_descent(conformer.coords().to_vec(), max_iterations, |x, g| {
            self.energy_and_gradient(x, g)
        });

        if !result.energy.is_finite() {
            return Err(RefineError::NonFinite);
        }
        if result.energy > before {
            return Err(RefineError::EnergyIncreased { before, after: result.energy });
        }
        debug!(
            before = before,
            after = result.energy,
            iterations = result.iterations,
            "Force-field refinement finished"
        );
        Ok(Conformer::new(result.coords))
    }
}

/// Harmonic distance term `k (d - r0)^2`; one-sided (only below `r0`) when `lower_only`.
pub(crate) fn stretch(
    coords: &[Point],
    grad: &mut [Point],
    i: usize,
    j: usize,
    r0: f64,
    k: f64,
    lower_only: bool,
) -> f64 {
    let delta = sub(coords[i], coords[j]);
    let d = norm(delta);
    if lower_only && d >= r0 {
        return 0.0;
    }
    let diff = d - r0;
    if d > 1e-10 {
        let coeff = 2.0 * k * diff / d;
        for axis in 0..3 {
            grad[i][axis] += coeff * delta[axis];
            grad[j][axis] -= coeff * delta[axis];
        }
    }
    k * diff * diff
}

fn bend(coords: &[Point], grad: &mut [Point], t: &AngleTerm) -> f64 {
    let u = sub(coords[t.i], coords[t.center]);
    let v = sub(coords[t.k], coords[t.center]);
    let (lu, lv) = (norm(u), norm(v));
    if lu < 1e-10 || lv < 1e-10 {
        return 0.0;
    }
    let cos = (dot(u, v) / (lu * lv)).clamp(-1.0, 1.0);
    let diff = cos - t.cos0;
    let coeff = 2.0 * ANGLE_K * diff;

    // d(cos)/d(a) and d(cos)/d(c); the centre takes the negated sum.
    let mut da = [0.0; 3];
    let mut dc = [0.0; 3];
    for axis in 0..3 {
        da[axis] = v[axis] / (lu * lv) - cos * u[axis] / (lu * lu);
        dc[axis] = u[axis] / (lu * lv) - cos * v[axis] / (lv * lv);
    }
    for axis in 0..3 {
        grad[t.i][axis] += coeff * da[axis];
        grad[t.k][axis] += coeff * dc[axis];
        grad[t.center][axis] -= coeff * (da[axis] + dc[axis]);
    }
    ANGLE_K * diff * diff
}

pub(crate) struct Minimized {
    pub coords: Vec<Point>,
    pub energy: f64,
    pub iterations: usize,
}

/// Steepest descent with a backtracking step: the largest atomic move per
/// iteration is `step` Å, grown after an accepted step and halved after a
/// rejected one. Energy never increases.
pub(crate) fn steepest_descent<F>(mut coords: Vec<Point>, max_iterations: usize, mut energy_fn: F) -> Minimized
where
    F: FnMut(&[Point], &mut [Point]) -> f64,
{
    let n = coords.len();
    let mut grad = vec![[0.0; 3]; n];
    let mut trial_grad = vec![[0.0; 3]; n];
    let mut trial = coords.clone();
    let mut energy = energy_fn(&coords, &mut grad);
    let mut step = INITIAL_STEP;
    let mut iterations = 0;

    while iterations < max_iterations && energy.is_finite() {
        let largest = grad.iter().map(|g| norm(*g)).fold(0.0, f64::max);
        if largest < GRADIENT_TOLERANCE {
            break;
        }

        let mut accepted = false;
        while step > MIN_STEP {
            let factor = step / largest;
            for (t, (x, g)) in trial.iter_mut().zip(coords.iter().zip(&grad)) {
                *t = sub(*x, scale(*g, factor));
            }
            let trial_energy = energy_fn(&trial, &mut trial_grad);
            if trial_energy.is_finite() && trial_energy < energy {
                std::mem::swap(&mut coords, &mut trial);
                std::mem::swap(&mut grad, &mut trial_grad);
                energy = trial_energy;
                step = (step * 1.2).min(MAX_STEP);
                accepted = true;
                break;
            }
            step *= 0.5;
        }
        if !accepted {
            break;
        }
        iterations += 1;
    }

    Minimized { coords, energy, iterations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn test_ideal_geometry() {
        let mol = parse_smiles("C=CC#N").unwrap();
        assert!((ideal_angle(&mol, 0) - 120f64.to_radians()).abs() < 1e-9);
        assert!((ideal_angle(&mol, 2) - std::f64::consts::PI).abs() < 1e-9);
        let single = ideal_bond_length(&mol, &mol.bonds()[1]);
        let double = ideal_bond_length(&mol, &mol.bonds()[0]);
        assert!(double < single);
        assert!((single - 1.52).abs() < 1e-9);
    }

    #[test]
    fn test_refine_relaxes_stretched_bond() {
        let mol = parse_smiles("CC").unwrap();
        let ff = ForceField::new(&mol);
        let start = Conformer::new(vec![[0.0, 0.0, 0.0], [2.5, 0.0, 0.0]]);
        let refined = ff.refine(&start, 500).unwrap();
        assert!((refined.distance(0, 1) - 1.52).abs() < 1e-2);
        assert!(ff.energy(refined.coords()) < ff.energy(start.coords()));
    }

    #[test]
    fn test_refine_rejects_bad_input() {
        let mol = parse_smiles("CC").unwrap();
        let ff = ForceField::new(&mol);
        let wrong_size = Conformer::new(vec![[0.0; 3]]);
        assert!(matches!(ff.refine(&wrong_size, 10), Err(RefineError::SizeMismatch { .. })));
        let nan = Conformer::new(vec![[0.0; 3], [f64::NAN, 0.0, 0.0]]);
        assert_eq!(ff.refine(&nan, 10), Err(RefineError::NonFinite));
    }

    #[test]
    fn test_topological_distances() {
        let mol = parse_smiles("CCC.O").unwrap();
        let topo = topological_distances(&mol);
        assert_eq!(topo[0][2], 2);
        assert_eq!(topo[0][3], usize::MAX);
    }
}
