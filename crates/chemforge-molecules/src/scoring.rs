//! Heuristic affinity scoring of a docked ligand.
//!
//! The affinity is an illustrative number derived from ligand mass plus a
//! random perturbation, not a binding-energy calculation. The breakdown is a
//! fixed proportional split of that one number.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::descriptors::round2;

const BASE_AFFINITY: f64 = -5.0;
const MASS_COEFFICIENT: f64 = 0.005;
const VDW_SHARE: f64 = 0.6;
const ELECTROSTATIC_SHARE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub van_der_waals: f64,
    pub electrostatic: f64,
    pub desolvation: f64,
}

impl ScoreBreakdown {
    /// Split an affinity 60/30/remainder. Desolvation takes the remainder
    /// so the three parts add back up to the affinity.
    pub fn split(affinity: f64) -> Self {
        let van_der_waals = round2(affinity * VDW_SHARE);
        let electrostatic = round2(affinity * ELECTROSTATIC_SHARE);
        let desolvation = round2(affinity - van_der_waals - electrostatic);
        Self { van_der_waals, electrostatic, desolvation }
    }

    pub fn total(&self) -> f64 {
        self.van_der_waals + self.electrostatic + self.desolvation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffinityScore {
    /// Estimated affinity in kcal/mol, rounded to 2 decimal places.
    pub affinity: f64,
    pub breakdown: ScoreBreakdown,
}

/// Scorer for docked ligands.
#[derive(Debug, Clone)]
pub struct AffinityScorer {
    perturbation: (f64, f64),
    seed: Option<u64>,
}

impl Default for AffinityScorer {
    fn default() -> Self {
        Self::new((-1.5, 0.5), None)
    }
}

impl AffinityScorer {
    /// `perturbation` bounds the uniform noise added to the mass term. With a
    /// seed every call draws the same noise, so equal ligands score equally.
    pub fn new(perturbation: (f64, f64), seed: Option<u64>) -> Self {
        let (a, b) = perturbation;
        Self { perturbation: (a.min(b), a.max(b)), seed }
    }

    /// Mass-only part of the score.
    pub fn base_score(exact_mass: f64) -> f64 {
        BASE_AFFINITY - MASS_COEFFICIENT * exact_mass
    }

    pub fn score(&self, exact_mass: f64) -> AffinityScore {
        let (low, high) = self.perturbation;
        let noise = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed).gen_range(low..=high),
            None => rand::thread_rng().gen_range(low..=high),
        };
        let affinity = round2(Self::base_score(exact_mass) + noise);
        AffinityScore { affinity, breakdown: ScoreBreakdown::split(affinity) }
    }
}
