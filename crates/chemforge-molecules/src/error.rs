use chemforge_common::ErrorKind;
use thiserror::Error;

/// Rejection of a molecular notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoleculeError {
    #[error("Invalid SMILES '{notation}': {reason}")]
    InvalidNotation { notation: String, reason: String },
}

impl MoleculeError {
    pub(crate) fn invalid(notation: &str, reason: impl Into<String>) -> Self {
        MoleculeError::InvalidNotation {
            notation: notation.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
