//! Canonical SMILES writer.
//!
//! Atoms are ranked by iterative refinement of graph invariants (element,
//! charge, degree, hydrogens, ring membership, then neighbour ranks) with
//! tie breaking, and the graph is written depth-first in rank order. Two
//! notations of the same graph produce the same string. Stereo marks are
//! not part of the canonical form.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::molecule::{BondOrder, Molecule};
use crate::smiles::default_hydrogens;

/// Canonical SMILES for a parsed molecule.
pub fn canonical_smiles(mol: &Molecule) -> String {
    if mol.is_empty() {
        return String::new();
    }
    let ranks = canonical_ranks(mol);
    CanonicalWriter::new(mol, &ranks).write()
}

/// A canonical rank for every atom; all ranks are distinct.
pub fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let ring_atoms = mol.ring_atoms();
    let invariants: Vec<_> = (0..mol.atom_count())
        .map(|i| {
            let atom = mol.atom(i);
            (
                atom.element.atomic_number(),
                atom.isotope.unwrap_or(0),
                atom.formal_charge,
                atom.aromatic,
                mol.degree(i),
                mol.total_hydrogens(i),
                ring_atoms[i],
            )
        })
        .collect();

    let mut ranks = dense_ranks(&invariants);
    loop {
        ranks = refine(mol, ranks);
        let Some(tied) = lowest_tied_class(&ranks) else {
            return ranks;
        };
        // Split the tie: the first atom of the class moves just below its peers.
        let chosen = ranks.iter().position(|&r| r == tied).unwrap_or(0);
        for r in ranks.iter_mut() {
            *r = *r * 2 + 1;
        }
        ranks[chosen] -= 1;
    }
}

fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut classes = count_classes(&ranks);
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..mol.atom_count())
            .map(|i| {
                let mut neighbourhood: Vec<(usize, u8)> = mol
                    .adjacency(i)
                    .iter()
                    .map(|&(n, bi)| (ranks[n], mol.bonds()[bi].order.ctfile_code()))
                    .collect();
                neighbourhood.sort_unstable();
                (ranks[i], neighbourhood)
            })
            .collect();
        let next = dense_ranks(&keys);
        let next_classes = count_classes(&next);
        if next_classes == classes {
            return next;
        }
        classes = next_classes;
        ranks = next;
    }
}

fn dense_ranks<K: Ord>(keys: &[K]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0; keys.len()];
    let mut rank = 0;
    for (pos, &idx) in order.iter().enumerate() {
        if pos > 0 && keys[order[pos - 1]] != keys[idx] {
            rank += 1;
        }
        ranks[idx] = rank;
    }
    ranks
}

fn count_classes(ranks: &[usize]) -> usize {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn lowest_tied_class(ranks: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &r in ranks {
        *counts.entry(r).or_default() += 1;
    }
    counts.into_iter().filter(|&(_, c)| c > 1).map(|(r, _)| r).min()
}

struct CanonicalWriter<'a> {
    mol: &'a Molecule,
    ranks: &'a [usize],
    visited: Vec<bool>,
    bond_used: Vec<bool>,
    /// Spanning-tree children of each atom: (child, bond index).
    children: Vec<Vec<(usize, usize)>>,
    /// Ring-closure bonds touching each atom, in discovery order.
    closures: Vec<Vec<usize>>,
    open_digits: HashMap<usize, u32>,
    out: String,
}

impl<'a> CanonicalWriter<'a> {
    fn new(mol: &'a Molecule, ranks: &'a [usize]) -> Self {
        let n = mol.atom_count();
        Self {
            mol,
            ranks,
            visited: vec![false; n],
            bond_used: vec![false; mol.bond_count()],
            children: vec![Vec::new(); n],
            closures: vec![Vec::new(); n],
            open_digits: HashMap::new(),
            out: String::new(),
        }
    }

    fn write(mut self) -> String {
        let (labels, count) = self.mol.component_labels();
        let mut starts: Vec<usize> = (0..count)
            .filter_map(|c| {
                (0..self.mol.atom_count())
                    .filter(|&i| labels[i] == c)
                    .min_by_key(|&i| self.ranks[i])
            })
            .collect();
        starts.sort_by_key(|&i| self.ranks[i]);

        for (k, &start) in starts.iter().enumerate() {
            if k > 0 {
                self.out.push('.');
            }
            self.span(start, None);
            self.emit(start);
        }
        self.out
    }

    fn span(&mut self, u: usize, via: Option<usize>) {
        self.visited[u] = true;
        let mut next: Vec<(usize, usize)> = self
            .mol
            .adjacency(u)
            .iter()
            .copied()
            .filter(|&(_, bi)| Some(bi) != via)
            .collect();
        next.sort_by_key(|&(v, _)| self.ranks[v]);

        for (v, bi) in next {
            if self.bond_used[bi] {
                continue;
            }
            self.bond_used[bi] = true;
            if self.visited[v] {
                self.closures[v].push(bi);
                self.closures[u].push(bi);
            } else {
                self.children[u].push((v, bi));
                self.span(v, Some(bi));
            }
        }
    }

    fn emit(&mut self, u: usize) {
        self.atom_symbol(u);

        for bi in self.closures[u].clone() {
            match self.open_digits.remove(&bi) {
                Some(digit) => push_ring_digit(&mut self.out, digit),
                None => {
                    let digit = self.free_digit();
                    self.open_digits.insert(bi, digit);
                    let symbol = self.bond_symbol(bi);
                    self.out.push_str(symbol);
                    push_ring_digit(&mut self.out, digit);
                }
            }
        }

        let children = self.children[u].clone();
        let last = children.len().saturating_sub(1);
        for (k, (v, bi)) in children.into_iter().enumerate() {
            let branch = k != last;
            if branch {
                self.out.push('(');
            }
            let symbol = self.bond_symbol(bi);
            self.out.push_str(symbol);
            self.emit(v);
            if branch {
                self.out.push(')');
            }
        }
    }

    fn free_digit(&self) -> u32 {
        (1..)
            .find(|d| !self.open_digits.values().any(|open| open == d))
            .unwrap_or(1)
    }

    fn bond_symbol(&self, bi: usize) -> &'static str {
        let bond = &self.mol.bonds()[bi];
        let both_aromatic = self.mol.atom(bond.begin).aromatic && self.mol.atom(bond.end).aromatic;
        match bond.order {
            BondOrder::Single if both_aromatic => "-",
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic if both_aromatic => "",
            BondOrder::Aromatic => ":",
        }
    }

    fn atom_symbol(&mut self, u: usize) {
        let mol = self.mol;
        let atom = mol.atom(u);
        let symbol = if atom.aromatic {
            atom.element.symbol().to_lowercase()
        } else {
            atom.element.symbol().to_string()
        };

        let plain = atom.element.is_organic_subset()
            && atom.formal_charge == 0
            && atom.isotope.is_none()
            && default_hydrogens(mol, u) == Some(atom.implicit_hydrogens);
        if plain {
            self.out.push_str(&symbol);
            return;
        }

        self.out.push('[');
        if let Some(isotope) = atom.isotope {
            let _ = write!(self.out, "{}", isotope);
        }
        self.out.push_str(&symbol);
        match atom.implicit_hydrogens {
            0 => {}
            1 => self.out.push('H'),
            h => {
                let _ = write!(self.out, "H{}", h);
            }
        }
        match atom.formal_charge {
            0 => {}
            1 => self.out.push('+'),
            -1 => self.out.push('-'),
            c if c > 0 => {
                let _ = write!(self.out, "+{}", c);
            }
            c => {
                let _ = write!(self.out, "-{}", -(c as i16));
            }
        }
        self.out.push(']');
    }
}

fn push_ring_digit(out: &mut String, digit: u32) {
    if digit < 10 {
        let _ = write!(out, "{}", digit);
    } else {
        let _ = write!(out, "%{}", digit);
    }
}
