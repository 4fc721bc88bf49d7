//! Pure SHA-256 helpers. Artifact identity is the SHA-256 hex digest of its
//! content; these helpers never touch storage or I/O.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `content`.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// True if `content` hashes to `expected`.
pub fn verify_hash(content: &[u8], expected: &str) -> bool {
    compute_hash(content) == expected
}
