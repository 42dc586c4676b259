//! Text exports of an embedded molecule: MDL SDF (V2000) and PDB HETATM blocks.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

use chemforge_common::ErrorKind;

use crate::conformer::Conformer;
use crate::embed::{ConformerEmbedder, EmbedFailure, EmbedOutcome};
use crate::error::MoleculeError;
use crate::molecule::Molecule;
use crate::smiles::parse_smiles;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    InvalidNotation(#[from] MoleculeError),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedFailure),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::InvalidNotation(_) => ErrorKind::Validation,
            ExportError::Embedding(_) => ErrorKind::Internal,
        }
    }
}

/// A structure block for a SMILES string.
#[derive(Debug, Clone, Serialize)]
pub struct StructureBlock {
    pub smiles: String,
    pub sdf: String,
    /// False when embedding degraded and the block carries a flat 2D layout.
    pub is_3d: bool,
}

/// Parse, add hydrogens, embed and write an SDF block.
pub fn structure_3d(smiles: &str, embedder: &ConformerEmbedder) -> Result<StructureBlock, ExportError> {
    let mol = parse_smiles(smiles)?.with_explicit_hydrogens();
    let (conformer, is_3d) = match embedder.embed(&mol) {
        EmbedOutcome::Success(embedded) => (embedded.conformer, true),
        EmbedOutcome::Degraded { layout, reason } => {
            debug!(smiles, reason = %reason, "Writing 2D layout instead of 3D structure");
            (layout, false)
        }
        EmbedOutcome::Failed(failure) => return Err(failure.into()),
    };
    Ok(StructureBlock {
        smiles: smiles.to_string(),
        sdf: to_sdf_block(&mol, &conformer, smiles),
        is_3d,
    })
}

fn ctfile_charge(charge: i8) -> u8 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

/// MDL V2000 molfile followed by the `$$$$` record separator.
pub fn to_sdf_block(mol: &Molecule, conformer: &Conformer, title: &str) -> String {
    let mut out = String::new();
    let dimension = if conformer.is_flat() { "2D" } else { "3D" };
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "  chemforge {}", dimension);
    out.push('\n');
    let _ = writeln!(
        out,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        mol.atom_count(),
        mol.bond_count()
    );

    for (atom, p) in mol.atoms().iter().zip(conformer.coords()) {
        let _ = writeln!(
            out,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
            p[0],
            p[1],
            p[2],
            atom.element.symbol(),
            ctfile_charge(atom.formal_charge)
        );
    }
    for bond in mol.bonds() {
        let _ = writeln!(
            out,
            "{:>3}{:>3}{:>3}  0",
            bond.begin + 1,
            bond.end + 1,
            bond.order.ctfile_code()
        );
    }

    let charged: Vec<(usize, i8)> = mol
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, a.formal_charge))
        .collect();
    for chunk in charged.chunks(8) {
        let _ = write!(out, "M  CHG{:>3}", chunk.len());
        for (idx, charge) in chunk {
            let _ = write!(out, "{:>4}{:>4}", idx, charge);
        }
        out.push('\n');
    }

    out.push_str("M  END\n$$$$\n");
    out
}

fn pdb_atom_name(symbol: &str, ordinal: usize) -> String {
    let name = format!("{}{}", symbol.to_uppercase(), ordinal);
    if symbol.len() == 1 && name.len() < 4 {
        format!(" {:<3}", name)
    } else {
        format!("{:<4}", &name[..name.len().min(4)])
    }
}

/// `HETATM` records for the ligand (residue `UNL`, chain `A`), `CONECT`
/// records for its bonds and a closing `END`.
pub fn to_pdb_block(mol: &Molecule, conformer: &Conformer) -> String {
    let mut out = String::new();
    let mut ordinals: HashMap<&str, usize> = HashMap::new();

    for (i, (atom, p)) in mol.atoms().iter().zip(conformer.coords()).enumerate() {
        let symbol = atom.element.symbol();
        let ordinal = ordinals.entry(symbol).or_insert(0);
        *ordinal += 1;
        let charge = match atom.formal_charge {
            0 => "  ".to_string(),
            c if c > 0 => format!("{}+", c),
            c => format!("{}-", -c),
        };
        let _ = writeln!(
            out,
            "HETATM{:>5} {} UNL A   1    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}{}",
            i + 1,
            pdb_atom_name(symbol, *ordinal),
            p[0],
            p[1],
            p[2],
            1.0,
            0.0,
            symbol.to_uppercase(),
            charge
        );
    }

    for i in 0..mol.atom_count() {
        let partners: Vec<usize> = mol.neighbors(i).map(|n| n + 1).collect();
        for chunk in partners.chunks(4) {
            let _ = write!(out, "CONECT{:>5}", i + 1);
            for p in chunk {
                let _ = write!(out, "{:>5}", p);
            }
            out.push('\n');
        }
    }
    out.push_str("END\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedConfig;

    fn ethanol() -> (Molecule, Conformer) {
        let mol = parse_smiles("CCO").unwrap();
        let conf = Conformer::new(vec![[0.0, 0.0, 0.0], [1.52, 0.0, 0.0], [2.0, 1.4, 0.1]]);
        (mol, conf)
    }

    #[test]
    fn test_sdf_layout() {
        let (mol, conf) = ethanol();
        let sdf = to_sdf_block(&mol, &conf, "ethanol");
        let lines: Vec<&str> = sdf.lines().collect();
        assert_eq!(lines[0], "ethanol");
        assert_eq!(lines[1], "  chemforge 3D");
        assert_eq!(lines[3], "  3  2  0  0  0  0  0  0  0  0999 V2000");
        assert!(lines[4].starts_with("    0.0000    0.0000    0.0000 C   0  0"));
        assert_eq!(lines[7], "  1  2  1  0");
        assert_eq!(lines[9], "M  END");
        assert_eq!(lines[10], "$$$$");
    }

    #[test]
    fn test_sdf_charges() {
        let mol = parse_smiles("C[N+](C)(C)C").unwrap();
        let conf = Conformer::new(vec![[0.0, 0.0, 1.0]; 5]);
        let sdf = to_sdf_block(&mol, &conf, "tetramethylammonium");
        assert!(sdf.contains("M  CHG  1   2   1"));
        assert!(sdf.lines().nth(5).unwrap().contains(" N   0  3"));
    }

    #[test]
    fn test_pdb_block() {
        let (mol, conf) = ethanol();
        let pdb = to_pdb_block(&mol, &conf);
        let hetatm: Vec<&str> = pdb.lines().filter(|l| l.starts_with("HETATM")).collect();
        assert_eq!(hetatm.len(), 3);
        assert_eq!(&hetatm[0][12..16], " C1 ");
        assert_eq!(&hetatm[2][12..16], " O1 ");
        assert_eq!(&hetatm[0][17..20], "UNL");
        assert_eq!(hetatm[1][30..38].trim(), "1.520");
        assert!(pdb.contains("CONECT    2    1    3"));
        assert!(pdb.ends_with("END\n"));
    }

    #[test]
    fn test_structure_3d() {
        let block = structure_3d("CCO", &ConformerEmbedder::default()).unwrap();
        assert!(block.is_3d);
        // 3 heavy atoms + 6 hydrogens
        assert!(block.sdf.contains("  9  8  0  0"));

        let err = structure_3d("C1CC", &ConformerEmbedder::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let degraded = EmbedConfig { max_iterations: 0, random_attempts: 0, ..EmbedConfig::default() };
        let block = structure_3d("CCO", &ConformerEmbedder::new(degraded)).unwrap();
        assert!(!block.is_3d);
        assert!(block.sdf.contains("chemforge 2D"));
    }
}
