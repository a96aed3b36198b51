//! Content hashing for generated model files.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a generated model document. Two prep runs over the same
/// inputs must yield the same digest.
pub fn model_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    format!("{:x}", result)
}
