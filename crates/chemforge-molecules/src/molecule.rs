//! Molecular graph produced by the SMILES parser.

use serde::{Deserialize, Serialize};
use crate::elements::Element;

/// Tetrahedral chirality tag as written in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Chirality {
    #[default]
    None,
    /// `@`
    CounterClockwise,
    /// `@@`
    Clockwise,
}

/// Cis/trans direction marker on a single bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondStereo {
    #[default]
    None,
    /// `/`
    Up,
    /// `\`
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Bond order as used for geometry (aromatic = 1.5).
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    /// Valence units consumed by one end of the bond. Aromatic bonds count
    /// one; the shared π unit is accounted for per atom.
    pub fn valence_units(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }

    /// MDL molfile bond type code.
    pub fn ctfile_code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub chirality: Chirality,
    pub implicit_hydrogens: u8,
    /// Written in bracket form in the source notation.
    pub bracket: bool,
    pub atom_class: Option<u32>,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            formal_charge: 0,
            isotope: None,
            chirality: Chirality::None,
            implicit_hydrogens: 0,
            bracket: false,
            atom_class: None,
        }
    }

    /// Isotope mass for labelled atoms, else the standard atomic weight.
    pub fn mass(&self) -> f64 {
        match self.isotope {
            Some(iso) => self.element.isotope_mass(iso),
            None => self.element.average_mass(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(begin: usize, end: usize, order: BondOrder) -> Self {
        Self { begin, end, order, stereo: BondStereo::None }
    }

    /// The atom on the other side of the bond from `atom`.
    pub fn partner(&self, atom: usize) -> usize {
        if self.begin == atom { self.end } else { self.begin }
    }
}

/// A molecular graph with atoms, bonds and adjacency information.
/// Immutable once built; transformations return a new molecule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// adjacency[atom] = [(neighbour, bond index)], in bond creation order.
    #[serde(skip)]
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Build a molecule from atoms and bonds, deriving the adjacency list.
    pub fn new(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.begin].push((bond.end, bi));
            adjacency[bond.end].push((bond.begin, bi));
        }
        Self { atoms, bonds, adjacency }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom(&self, idx: usize) -> &Atom {
        &self.atoms[idx]
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// (neighbour, bond index) pairs for an atom.
    pub fn adjacency(&self, idx: usize) -> &[(usize, usize)] {
        &self.adjacency[idx]
    }

    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[idx].iter().map(|&(n, _)| n)
    }

    /// Number of explicit graph neighbours.
    pub fn degree(&self, idx: usize) -> usize {
        self.adjacency[idx].len()
    }

    /// Number of non-hydrogen neighbours.
    pub fn heavy_degree(&self, idx: usize) -> usize {
        self.neighbors(idx).filter(|&n| !self.atoms[n].element.is_hydrogen()).count()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bi)| &self.bonds[bi])
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.element.is_hydrogen()).count()
    }

    /// Implicit plus explicit (graph) hydrogens on an atom.
    pub fn total_hydrogens(&self, idx: usize) -> usize {
        let explicit = self.neighbors(idx).filter(|&n| self.atoms[n].element.is_hydrogen()).count();
        self.atoms[idx].implicit_hydrogens as usize + explicit
    }

    pub fn total_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }

    /// Connected-component label for every atom, labels numbered from 0 in
    /// order of first appearance.
    pub fn component_labels(&self) -> (Vec<usize>, usize) {
        let n = self.atoms.len();
        let mut labels = vec![usize::MAX; n];
        let mut count = 0;
        for start in 0..n {
            if labels[start] != usize::MAX {
                continue;
            }
            let mut stack = vec![start];
            labels[start] = count;
            while let Some(u) = stack.pop() {
                for v in self.neighbors(u) {
                    if labels[v] == usize::MAX {
                        labels[v] = count;
                        stack.push(v);
                    }
                }
            }
            count += 1;
        }
        (labels, count)
    }

    /// For every bond, whether it belongs to at least one ring (i.e. is not a
    /// bridge of the graph).
    pub fn ring_bonds(&self) -> Vec<bool> {
        let n = self.atoms.len();
        let mut in_ring = vec![true; self.bonds.len()];
        let mut disc = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut timer = 0usize;

        for root in 0..n {
            if disc[root] != usize::MAX {
                continue;
            }
            // Iterative Tarjan bridge search: (atom, bond used to enter, next adjacency slot)
            let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
            disc[root] = timer;
            low[root] = timer;
            timer += 1;

            while let Some(top) = stack.last_mut() {
                let (u, via, slot) = *top;
                if let Some(&(v, bi)) = self.adjacency[u].get(slot) {
                    top.2 += 1;
                    if bi == via {
                        continue;
                    }
                    if disc[v] == usize::MAX {
                        disc[v] = timer;
                        low[v] = timer;
                        timer += 1;
                        stack.push((v, bi, 0));
                    } else {
                        low[u] = low[u].min(disc[v]);
                    }
                } else {
                    stack.pop();
                    if let Some(&(parent, _, _)) = stack.last() {
                        low[parent] = low[parent].min(low[u]);
                        if low[u] > disc[parent] {
                            in_ring[via] = false;
                        }
                    }
                }
            }
        }
        in_ring
    }

    /// Atoms that sit on at least one ring.
    pub fn ring_atoms(&self) -> Vec<bool> {
        let ring_bonds = self.ring_bonds();
        let mut atoms = vec![false; self.atoms.len()];
        for (bond, in_ring) in self.bonds.iter().zip(ring_bonds) {
            if in_ring {
                atoms[bond.begin] = true;
                atoms[bond.end] = true;
            }
        }
        atoms
    }

    /// Cyclomatic number: bonds − atoms + components.
    pub fn ring_count(&self) -> usize {
        let (_, components) = self.component_labels();
        (self.bonds.len() + components).saturating_sub(self.atoms.len())
    }

    /// A copy of the molecule where every implicit hydrogen is an explicit atom.
    ///
    /// Existing atoms keep their indices; new hydrogens are appended in
    /// parent order, so coordinates for the heavy-atom skeleton stay
    /// index-aligned with the original molecule.
    pub fn with_explicit_hydrogens(&self) -> Molecule {
        let mut atoms = self.atoms.clone();
        let mut bonds = self.bonds.clone();
        for (idx, atom) in self.atoms.iter().enumerate() {
            for _ in 0..atom.implicit_hydrogens {
                let h = atoms.len();
                atoms.push(Atom::new(Element::H));
                bonds.push(Bond::new(idx, h, BondOrder::Single));
            }
            atoms[idx].implicit_hydrogens = 0;
        }
        Molecule::new(atoms, bonds)
    }
}
