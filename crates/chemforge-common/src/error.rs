use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChemforgeError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Security policy violation: {0}")]
    Security(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChemforgeError>;

/// Coarse classification of an error, used by whatever surface exposes the
/// engines (HTTP status, CLI exit code, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller sent something unusable (bad notation, bad name).
    Validation,
    /// The caller referenced something that does not exist.
    NotFound,
    /// Everything else: network, timeouts, worker failures.
    Internal,
}

impl ErrorKind {
    /// Process exit code used by the CLI for this class of error.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Internal   => 1,
            ErrorKind::Validation => 2,
            ErrorKind::NotFound   => 3,
        }
    }

    /// Closest HTTP status for this class of error.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 422,
            ErrorKind::NotFound   => 404,
            ErrorKind::Internal   => 500,
        }
    }
}

impl ChemforgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChemforgeError::Validation(_) | ChemforgeError::Config(_) => ErrorKind::Validation,
            ChemforgeError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ChemforgeError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(ChemforgeError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ChemforgeError::Security("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_status_codes_are_distinct() {
        assert_eq!(ErrorKind::Validation.http_status(), 422);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_ne!(ErrorKind::Validation.exit_code(), ErrorKind::NotFound.exit_code());
    }
}
