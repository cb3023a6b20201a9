//! Checksum utilities for generated schema fingerprints

use sha2::{Sha256, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of a schema artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from text
    pub fn from_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        Self::from_text(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}
