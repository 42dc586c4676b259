//! SMILES parsing and structural validation.
//!
//! The parser builds the molecular graph in one left-to-right pass and then
//! runs the chemistry checks: implicit hydrogens and valence for the organic
//! subset, aromatic ring membership and kekulization of aromatic systems.

use std::collections::BTreeMap;
use tracing::debug;

use crate::elements::Element;
use crate::error::MoleculeError;
use crate::molecule::{Atom, Bond, BondOrder, BondStereo, Chirality, Molecule};

/// Parse and validate a SMILES string.
pub fn parse_smiles(notation: &str) -> Result<Molecule, MoleculeError> {
    let trimmed = notation.trim();
    if trimmed.is_empty() {
        return Err(MoleculeError::invalid(notation, "empty notation"));
    }

    let graph = Parser::new(trimmed)
        .parse()
        .map_err(|reason| MoleculeError::invalid(notation, reason))?;
    let molecule = finish(graph).map_err(|reason| MoleculeError::invalid(notation, reason))?;

    debug!(
        smiles = trimmed,
        atoms = molecule.atom_count(),
        bonds = molecule.bond_count(),
        "Parsed SMILES"
    );
    Ok(molecule)
}

// ── Grammar ──────────────────────────────────────────────────────────────────

struct RawGraph {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

/// Ring-closure digit waiting for its partner: (atom, explicit bond at the opening).
type OpenRing = (usize, Option<(BondOrder, BondStereo)>);

struct Parser {
    chars: Vec<char>,
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    prev: Option<usize>,
    pending_bond: Option<(BondOrder, BondStereo)>,
    /// (atom before the branch, atom count when the branch opened)
    branches: Vec<(usize, usize)>,
    rings: BTreeMap<u32, OpenRing>,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            pending_bond: None,
            branches: Vec::new(),
            rings: BTreeMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn parse(mut self) -> Result<RawGraph, String> {
        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let prev = self.prev.ok_or_else(|| self.error("branch opened before any atom"))?;
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol directly before '('"));
                    }
                    self.branches.push((prev, self.atoms.len()));
                    self.bump();
                }
                ')' => {
                    let (atom, count_at_open) =
                        self.branches.pop().ok_or_else(|| self.error("unmatched ')'"))?;
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol at end of branch"));
                    }
                    if self.atoms.len() == count_at_open {
                        return Err(self.error("empty branch"));
                    }
                    self.prev = Some(atom);
                    self.bump();
                }
                '.' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol before '.'"));
                    }
                    if !self.branches.is_empty() {
                        return Err(self.error("'.' inside a branch"));
                    }
                    self.prev = None;
                    self.bump();
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.prev.is_none() {
                        return Err(self.error("bond symbol without a preceding atom"));
                    }
                    if self.pending_bond.is_some() {
                        return Err(self.error("two consecutive bond symbols"));
                    }
                    self.pending_bond = Some(match ch {
                        '-' => (BondOrder::Single, BondStereo::None),
                        '=' => (BondOrder::Double, BondStereo::None),
                        '#' => (BondOrder::Triple, BondStereo::None),
                        ':' => (BondOrder::Aromatic, BondStereo::None),
                        '/' => (BondOrder::Single, BondStereo::Up),
                        _ => (BondOrder::Single, BondStereo::Down),
                    });
                    self.bump();
                }
                '0'..='9' => {
                    self.bump();
                    let number = ch as u32 - '0' as u32;
                    self.ring_closure(number)?;
                }
                '%' => {
                    self.bump();
                    let d1 = self.bump().and_then(|c| c.to_digit(10));
                    let d2 = self.bump().and_then(|c| c.to_digit(10));
                    match (d1, d2) {
                        (Some(a), Some(b)) => self.ring_closure(a * 10 + b)?,
                        _ => return Err(self.error("'%' must be followed by two digits")),
                    }
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.push_atom(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.push_atom(atom)?;
                }
            }
        }

        if self.pending_bond.is_some() {
            return Err("notation ends with a bond symbol".to_string());
        }
        if !self.branches.is_empty() {
            return Err("unclosed '('".to_string());
        }
        if let Some(number) = self.rings.keys().next() {
            return Err(format!("unclosed ring closure {}", number));
        }
        if self.atoms.is_empty() {
            return Err("no atoms".to_string());
        }

        Ok(RawGraph { atoms: self.atoms, bonds: self.bonds })
    }

    fn error(&self, what: &str) -> String {
        format!("{} at position {}", what, self.pos)
    }

    fn push_atom(&mut self, atom: Atom) -> Result<(), String> {
        let idx = self.atoms.len();
        let aromatic = atom.aromatic;
        self.atoms.push(atom);

        if let Some(prev) = self.prev {
            let (order, stereo) = self
                .pending_bond
                .take()
                .unwrap_or_else(|| (implicit_order(self.atoms[prev].aromatic, aromatic), BondStereo::None));
            self.bonds.push(Bond { begin: prev, end: idx, order, stereo });
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_closure(&mut self, number: u32) -> Result<(), String> {
        let current = self
            .prev
            .ok_or_else(|| self.error("ring closure without a preceding atom"))?;
        let explicit = self.pending_bond.take();

        match self.rings.remove(&number) {
            None => {
                self.rings.insert(number, (current, explicit));
            }
            Some((other, opened_with)) => {
                if other == current {
                    return Err(self.error("ring closure bonds an atom to itself"));
                }
                let already_bonded = self.bonds.iter().any(|b| {
                    (b.begin == other && b.end == current) || (b.begin == current && b.end == other)
                });
                if already_bonded {
                    return Err(self.error("ring closure duplicates an existing bond"));
                }
                let (order, stereo) = match (opened_with, explicit) {
                    (Some(a), Some(b)) if a.0 != b.0 => {
                        return Err(self.error("conflicting bond orders on ring closure"));
                    }
                    (Some(bond), _) | (None, Some(bond)) => bond,
                    (None, None) => (
                        implicit_order(self.atoms[other].aromatic, self.atoms[current].aromatic),
                        BondStereo::None,
                    ),
                };
                self.bonds.push(Bond { begin: other, end: current, order, stereo });
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, String> {
        let ch = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
        let (symbol, aromatic, width) = match (ch, self.peek_at(1)) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B', _) => ("B", false, 1),
            ('C', _) => ("C", false, 1),
            ('N', _) => ("N", false, 1),
            ('O', _) => ("O", false, 1),
            ('P', _) => ("P", false, 1),
            ('S', _) => ("S", false, 1),
            ('F', _) => ("F", false, 1),
            ('I', _) => ("I", false, 1),
            ('b', _) => ("B", true, 1),
            ('c', _) => ("C", true, 1),
            ('n', _) => ("N", true, 1),
            ('o', _) => ("O", true, 1),
            ('p', _) => ("P", true, 1),
            ('s', _) => ("S", true, 1),
            _ => return Err(self.error(&format!("unexpected character '{}'", ch))),
        };
        self.pos += width;

        let element = Element::from_symbol(symbol)
            .ok_or_else(|| self.error(&format!("unknown element '{}'", symbol)))?;
        Ok(Atom { aromatic, ..Atom::new(element) })
    }

    /// `[isotope? symbol chirality? Hcount? charge? (:class)?]`
    fn bracket_atom(&mut self) -> Result<Atom, String> {
        self.bump(); // '['

        let isotope = self.number()?.map(|n| u16::try_from(n)).transpose()
            .map_err(|_| self.error("isotope out of range"))?;

        let (element, aromatic) = self.bracket_symbol()?;
        let mut atom = Atom { aromatic, isotope, bracket: true, ..Atom::new(element) };

        if self.peek() == Some('@') {
            self.bump();
            atom.chirality = if self.peek() == Some('@') {
                self.bump();
                Chirality::Clockwise
            } else {
                Chirality::CounterClockwise
            };
        }

        if self.peek() == Some('H') {
            self.bump();
            let count = match self.peek().and_then(|c| c.to_digit(10)) {
                Some(d) => {
                    self.bump();
                    d as u8
                }
                None => 1,
            };
            atom.implicit_hydrogens = count;
        }

        if let Some(sign @ ('+' | '-')) = self.peek() {
            self.bump();
            let unit: i32 = if sign == '+' { 1 } else { -1 };
            let mut magnitude = 1;
            if let Some(n) = self.number()? {
                magnitude = i32::try_from(n).map_err(|_| self.error("formal charge out of range"))?;
            } else {
                while self.peek() == Some(sign) {
                    self.bump();
                    magnitude += 1;
                }
            }
            let charge = unit * magnitude;
            atom.formal_charge = i8::try_from(charge)
                .ok()
                .filter(|c| c.abs() <= 15)
                .ok_or_else(|| self.error("formal charge out of range"))?;
        }

        if self.peek() == Some(':') {
            self.bump();
            atom.atom_class = Some(self.number()?.ok_or_else(|| self.error("atom class needs digits"))?);
        }

        match self.bump() {
            Some(']') => Ok(atom),
            Some(c) => Err(format!("unexpected '{}' in bracket atom at position {}", c, self.pos - 1)),
            None => Err("unterminated bracket atom".to_string()),
        }
    }

    fn bracket_symbol(&mut self) -> Result<(Element, bool), String> {
        let first = self.peek().ok_or_else(|| self.error("empty bracket atom"))?;

        if first.is_ascii_lowercase() {
            // Aromatic: two-letter forms first
            for two in ["se", "as"] {
                if self.peek() == two.chars().next() && self.peek_at(1) == two.chars().nth(1) {
                    self.pos += 2;
                    let symbol = capitalize(two);
                    let element = Element::from_symbol(&symbol)
                        .ok_or_else(|| self.error("unknown aromatic element"))?;
                    return Ok((element, true));
                }
            }
            if matches!(first, 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
                self.bump();
                let symbol = first.to_ascii_uppercase().to_string();
                let element = Element::from_symbol(&symbol)
                    .ok_or_else(|| self.error("unknown aromatic element"))?;
                return Ok((element, true));
            }
            return Err(self.error(&format!("unknown aromatic symbol '{}'", first)));
        }

        if !first.is_ascii_uppercase() {
            return Err(self.error(&format!("expected element symbol, found '{}'", first)));
        }

        if let Some(second) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
            let symbol: String = [first, second].iter().collect();
            if let Some(element) = Element::from_symbol(&symbol) {
                self.pos += 2;
                return Ok((element, false));
            }
        }
        let symbol = first.to_string();
        let element = Element::from_symbol(&symbol)
            .ok_or_else(|| self.error(&format!("unknown element '{}'", symbol)))?;
        self.bump();
        Ok((element, false))
    }

    fn number(&mut self) -> Result<Option<u32>, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map(Some)
            .map_err(|_| format!("number too large at position {}", start))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn implicit_order(a_aromatic: bool, b_aromatic: bool) -> BondOrder {
    if a_aromatic && b_aromatic { BondOrder::Aromatic } else { BondOrder::Single }
}

// ── Chemistry checks ─────────────────────────────────────────────────────────

/// Valence units used by the explicit bonds of an atom.
fn bonded_valence(bonds: &[Bond], idx: usize) -> u8 {
    bonds
        .iter()
        .filter(|b| b.begin == idx || b.end == idx)
        .map(|b| b.order.valence_units())
        .sum()
}

/// Whether an aromatic atom still has a free valence unit for a ring π bond.
fn needs_pi_bond(atom: &Atom, bonded: u8) -> bool {
    if !atom.aromatic {
        return false;
    }
    let hydrogens = if atom.bracket { atom.implicit_hydrogens } else { 0 };
    match atom.element.charged_valence(atom.formal_charge) {
        Some(valence) => valence as i16 - bonded as i16 - hydrogens as i16 >= 1,
        None => false,
    }
}

/// Hydrogens an organic-subset atom carries given its bonds, or `None` if
/// the bonds exceed every allowed valence.
pub(crate) fn organic_hydrogens(atom: &Atom, bonded: u8) -> Option<u8> {
    let pi = needs_pi_bond(atom, bonded) as u8;
    let used = bonded + pi;
    atom.element
        .default_valences()
        .iter()
        .find(|&&v| v >= used)
        .map(|&v| v - used)
}

/// Hydrogen count an atom would get if written without brackets. Used by the
/// canonical writer to decide whether brackets are needed.
pub(crate) fn default_hydrogens(mol: &Molecule, idx: usize) -> Option<u8> {
    let atom = mol.atom(idx);
    let probe = Atom { bracket: false, implicit_hydrogens: 0, ..atom.clone() };
    organic_hydrogens(&probe, bonded_valence(mol.bonds(), idx))
}

fn finish(graph: RawGraph) -> Result<Molecule, String> {
    let RawGraph { mut atoms, bonds } = graph;

    for idx in 0..atoms.len() {
        if atoms[idx].bracket {
            continue;
        }
        let bonded = bonded_valence(&bonds, idx);
        let atom = &atoms[idx];
        let hydrogens = organic_hydrogens(atom, bonded).ok_or_else(|| {
            format!(
                "valence of {} atom {} exceeded ({} bonds)",
                atom.element, idx, bonded
            )
        })?;
        atoms[idx].implicit_hydrogens = hydrogens;
    }

    let molecule = Molecule::new(atoms, bonds);
    check_aromaticity(&molecule)?;
    Ok(molecule)
}

/// Aromatic atoms must lie on rings, and each aromatic system must admit a
/// Kekulé structure (every atom needing a π bond gets exactly one).
fn check_aromaticity(mol: &Molecule) -> Result<(), String> {
    if !mol.atoms().iter().any(|a| a.aromatic) {
        return Ok(());
    }

    let ring_atoms = mol.ring_atoms();
    for (idx, atom) in mol.atoms().iter().enumerate() {
        if atom.aromatic && !ring_atoms[idx] {
            return Err(format!("non-ring atom {} marked aromatic", idx));
        }
    }

    let needs_pi: Vec<bool> = (0..mol.atom_count())
        .map(|idx| needs_pi_bond(mol.atom(idx), bonded_valence(mol.bonds(), idx)))
        .collect();

    let mut partner: Vec<Option<usize>> = vec![None; mol.atom_count()];
    let mut budget = KEKULE_SEARCH_BUDGET;
    if kekulize(mol, &needs_pi, &mut partner, &mut budget) {
        Ok(())
    } else if budget == 0 {
        // Pathologically large aromatic system: accept rather than reject valid input.
        debug!("Kekulé search budget exhausted; accepting aromatic system");
        Ok(())
    } else {
        Err("can't kekulize aromatic system".to_string())
    }
}

const KEKULE_SEARCH_BUDGET: usize = 200_000;

/// Backtracking perfect matching over aromatic bonds between atoms that need
/// a π bond. Always extends the most constrained unmatched atom first.
fn kekulize(
    mol: &Molecule,
    needs_pi: &[bool],
    partner: &mut [Option<usize>],
    budget: &mut usize,
) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    let options = |u: usize, partner: &[Option<usize>]| -> Vec<usize> {
        mol.adjacency(u)
            .iter()
            .filter(|&&(v, bi)| {
                mol.bonds()[bi].order == BondOrder::Aromatic && needs_pi[v] && partner[v].is_none()
            })
            .map(|&(v, _)| v)
            .collect()
    };

    let mut best: Option<(usize, Vec<usize>)> = None;
    for u in 0..mol.atom_count() {
        if !needs_pi[u] || partner[u].is_some() {
            continue;
        }
        let opts = options(u, partner);
        if opts.is_empty() {
            return false;
        }
        if best.as_ref().map_or(true, |(_, b)| opts.len() < b.len()) {
            best = Some((u, opts));
        }
    }

    let (u, opts) = match best {
        None => return true,
        Some(b) => b,
    };
    for v in opts {
        partner[u] = Some(v);
        partner[v] = Some(u);
        if kekulize(mol, needs_pi, partner, budget) {
            return true;
        }
        partner[u] = None;
        partner[v] = None;
        if *budget == 0 {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(s: &str) -> Molecule {
        parse_smiles(s).unwrap_or_else(|e| panic!("{} should parse: {}", s, e))
    }

    fn rejects(s: &str) {
        match parse_smiles(s) {
            Err(MoleculeError::InvalidNotation { .. }) => {}
            Ok(_) => panic!("{} should be rejected", s),
        }
    }

    fn hydrogens(mol: &Molecule) -> Vec<u8> {
        mol.atoms().iter().map(|a| a.implicit_hydrogens).collect()
    }

    #[test]
    fn test_ethanol() {
        let mol = ok("CCO");
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(hydrogens(&mol), vec![3, 2, 1]);
    }

    #[test]
    fn test_branches_and_double_bonds() {
        let mol = ok("CC(=O)O");
        assert_eq!(hydrogens(&mol), vec![3, 0, 0, 1]);
        assert_eq!(mol.bond_between(1, 2).map(|b| b.order), Some(BondOrder::Double));
    }

    #[test]
    fn test_benzene_aromatic() {
        let mol = ok("c1ccccc1");
        assert_eq!(mol.bond_count(), 6);
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert_eq!(hydrogens(&mol), vec![1; 6]);
    }

    #[test]
    fn test_heteroaromatics() {
        let pyridine = ok("c1ccncc1");
        assert_eq!(pyridine.atom(3).implicit_hydrogens, 0);
        let pyrrole = ok("c1cc[nH]c1");
        assert_eq!(pyrrole.atom(3).implicit_hydrogens, 1);
        ok("c1ccoc1");
        ok("c1ccsc1");
        ok("Cn1cnc2c1c(=O)n(C)c(=O)n2C"); // caffeine
        ok("c1ccc2ccccc2c1"); // naphthalene
        ok("c1ccc2[nH]ccc2c1"); // indole
        ok("C[n+]1ccccc1");
    }

    #[test]
    fn test_aspirin() {
        let mol = ok("CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(mol.heavy_atom_count(), 13);
        assert_eq!(mol.ring_count(), 1);
    }

    #[test]
    fn test_bracket_atoms() {
        let mol = ok("[13CH4]");
        assert_eq!(mol.atom(0).isotope, Some(13));
        assert_eq!(mol.atom(0).implicit_hydrogens, 4);

        let mol = ok("[NH4+]");
        assert_eq!(mol.atom(0).formal_charge, 1);

        let mol = ok("[O-]C(=O)C");
        assert_eq!(mol.atom(0).formal_charge, -1);
        assert_eq!(mol.atom(0).implicit_hydrogens, 0);

        let mol = ok("[Fe++]");
        assert_eq!(mol.atom(0).formal_charge, 2);

        let mol = ok("[CH3:7]C");
        assert_eq!(mol.atom(0).atom_class, Some(7));
    }

    #[test]
    fn test_metal_bracket_atoms() {
        for (s, symbol, charge) in [
            ("[Pd]", "Pd", 0),
            ("[Ti+4]", "Ti", 4),
            ("[Cs+]", "Cs", 1),
            ("[Ba++]", "Ba", 2),
            ("[Gd+3]", "Gd", 3),
            ("[Cr]", "Cr", 0),
            ("[U]", "U", 0),
        ] {
            let mol = ok(s);
            assert_eq!(mol.atom(0).element.symbol(), symbol, "{}", s);
            assert_eq!(mol.atom(0).formal_charge, charge, "{}", s);
        }
        ok("Cl[Pt](Cl)([NH3])[NH3]");
    }

    #[test]
    fn test_charge_magnitude_overflow_rejected() {
        rejects("[C+4294967295]");
        rejects("[C+2147483648]");
        rejects("[C-2147483649]");
        rejects("[C+16]");
        assert_eq!(ok("[Fe+15]").atom(0).formal_charge, 15);
    }

    #[test]
    fn test_stereo_is_recorded() {
        let mol = ok("C[C@@H](N)C(=O)O");
        assert_eq!(mol.atom(1).chirality, Chirality::Clockwise);
        assert_eq!(mol.atom(1).implicit_hydrogens, 1);

        let mol = ok("F/C=C/F");
        assert_eq!(mol.bonds()[0].stereo, BondStereo::Up);
        assert_eq!(mol.bonds()[2].stereo, BondStereo::Up);
    }

    #[test]
    fn test_two_digit_ring_closure_and_dot() {
        let mol = ok("C%10CC%10");
        assert_eq!(mol.ring_count(), 1);
        let mol = ok("[Na+].[Cl-]");
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(mol.component_labels().1, 2);
    }

    #[test]
    fn test_ring_closure_bond_order() {
        let mol = ok("C=1CCCCC=1");
        assert_eq!(mol.bond_between(0, 5).map(|b| b.order), Some(BondOrder::Double));
        rejects("C=1CCCCC#1");
    }

    #[test]
    fn test_hypervalent_forms_allowed() {
        ok("CS(=O)(=O)C"); // sulfone, S valence 6
        ok("C[N+](C)(C)C");
        ok("OP(=O)(O)O");
    }

    #[test]
    fn test_rejections() {
        rejects("");
        rejects("   ");
        rejects("not a molecule");
        rejects("C(C");
        rejects("CC)");
        rejects("C1CC");
        rejects("C=");
        rejects("=C");
        rejects("C()C");
        rejects("C==C");
        rejects("C(C)(C)(C)(C)C"); // pentavalent carbon
        rejects("[Xx]");
        rejects("[C");
        rejects("C11");
        rejects("C1C1");
        rejects("cc"); // aromatic outside ring
        rejects("c1cccc1"); // odd aromatic ring
        rejects("c1ccnc1"); // pyrrole N without H
        rejects("C%1C");
    }

    #[test]
    fn test_error_is_distinguishable() {
        let err = parse_smiles("C1CC").unwrap_err();
        let MoleculeError::InvalidNotation { notation, reason } = err;
        assert_eq!(notation, "C1CC");
        assert!(reason.contains("ring closure"), "{}", reason);
    }
}
