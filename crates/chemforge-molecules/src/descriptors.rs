//! Derived molecular descriptors and the validation report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::canonical::canonical_smiles;
use crate::elements::Element;
use crate::molecule::{BondOrder, Molecule};
use crate::smiles::parse_smiles;

const ELECTRON_MASS: f64 = 0.000_548_579_909;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    pub canonical_smiles: String,
    pub molecular_formula: String,
    /// Average molecular weight, rounded to 2 decimal places.
    pub molecular_weight: f64,
    /// Monoisotopic mass.
    pub exact_mass: f64,
    /// Atoms in the graph (implicit hydrogens excluded).
    pub num_atoms: usize,
    pub num_heavy_atoms: usize,
    pub num_rings: usize,
    pub num_rotatable_bonds: usize,
}

impl Descriptors {
    pub fn from_molecule(mol: &Molecule) -> Self {
        Self {
            canonical_smiles: canonical_smiles(mol),
            molecular_formula: molecular_formula(mol),
            molecular_weight: round2(average_mass(mol)),
            exact_mass: exact_mass(mol),
            num_atoms: mol.atom_count(),
            num_heavy_atoms: mol.heavy_atom_count(),
            num_rings: mol.ring_count(),
            num_rotatable_bonds: rotatable_bonds(mol),
        }
    }
}

/// Result of checking a SMILES string, shaped like the validation endpoint
/// response: descriptors on success, an error message otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmilesValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smiles: Option<String>,
    #[serde(flatten)]
    pub descriptors: Option<Descriptors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn validate_smiles(notation: &str) -> SmilesValidation {
    match parse_smiles(notation) {
        Ok(mol) => SmilesValidation {
            valid: true,
            smiles: Some(notation.to_string()),
            descriptors: Some(Descriptors::from_molecule(&mol)),
            error: None,
        },
        Err(e) => SmilesValidation {
            valid: false,
            smiles: None,
            descriptors: None,
            error: Some(e.to_string()),
        },
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn element_counts(mol: &Molecule) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for atom in mol.atoms() {
        *counts.entry(atom.element.symbol()).or_insert(0) += 1;
        if atom.implicit_hydrogens > 0 {
            *counts.entry(Element::H.symbol()).or_insert(0) += atom.implicit_hydrogens as usize;
        }
    }
    counts
}

/// Hill-order formula: C, then H, then the rest alphabetically (purely
/// alphabetical without carbon), followed by the net charge.
pub fn molecular_formula(mol: &Molecule) -> String {
    let mut counts = element_counts(mol);
    let mut formula = String::new();
    let push = |symbol: &str, count: usize, out: &mut String| {
        out.push_str(symbol);
        if count > 1 {
            let _ = write!(out, "{}", count);
        }
    };

    if let Some(c) = counts.remove("C") {
        push("C", c, &mut formula);
        if let Some(h) = counts.remove("H") {
            push("H", h, &mut formula);
        }
    }
    for (symbol, count) in counts {
        push(symbol, count, &mut formula);
    }

    match mol.total_charge() {
        0 => {}
        1 => formula.push('+'),
        -1 => formula.push('-'),
        c if c > 0 => {
            let _ = write!(formula, "+{}", c);
        }
        c => {
            let _ = write!(formula, "-{}", -c);
        }
    }
    formula
}

pub fn average_mass(mol: &Molecule) -> f64 {
    mol.atoms()
        .iter()
        .map(|a| a.mass() + a.implicit_hydrogens as f64 * Element::H.average_mass())
        .sum()
}

/// Monoisotopic mass, corrected for the electrons lost or gained by the net charge.
pub fn exact_mass(mol: &Molecule) -> f64 {
    let nuclear: f64 = mol
        .atoms()
        .iter()
        .map(|a| {
            let own = match a.isotope {
                Some(iso) => a.element.isotope_mass(iso),
                None => a.element.monoisotopic_mass(),
            };
            own + a.implicit_hydrogens as f64 * Element::H.monoisotopic_mass()
        })
        .sum();
    nuclear - mol.total_charge() as f64 * ELECTRON_MASS
}

/// Single, acyclic bonds between two non-terminal heavy atoms, excluding
/// bonds next to a triple bond.
pub fn rotatable_bonds(mol: &Molecule) -> usize {
    let ring_bonds = mol.ring_bonds();
    let has_triple = |atom: usize| {
        mol.adjacency(atom)
            .iter()
            .any(|&(_, bi)| mol.bonds()[bi].order == BondOrder::Triple)
    };

    mol.bonds()
        .iter()
        .enumerate()
        .filter(|&(bi, bond)| {
            bond.order == BondOrder::Single
                && !ring_bonds[bi]
                && !mol.atom(bond.begin).element.is_hydrogen()
                && !mol.atom(bond.end).element.is_hydrogen()
                && mol.heavy_degree(bond.begin) >= 2
                && mol.heavy_degree(bond.end) >= 2
                && !has_triple(bond.begin)
                && !has_triple(bond.end)
        })
        .count()
}
