use sha2::{Digest, Sha256};

/// Hex SHA-256 of the raw input bytes, reported alongside every load so two
/// runs can be matched to the same source file.
pub fn content_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
