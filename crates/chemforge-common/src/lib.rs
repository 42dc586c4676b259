//! chemforge-common — Shared errors and network plumbing used across all Chemforge crates.

pub mod error;
pub mod sandbox;

// Re-export commonly used types
pub use error::{ChemforgeError, ErrorKind};
pub use sandbox::SandboxClient;
