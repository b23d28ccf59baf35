//! Hashing helpers for Ingot.

use sha2::{Digest, Sha256};

/// Calculate SHA256 hash of input data
pub fn calculate_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double SHA256, used as the integrity trailer of on-disk cache files.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    calculate_sha256(&calculate_sha256(data))
}

/// BLAKE3 object digest, used for message and vote identifiers.
pub fn object_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
