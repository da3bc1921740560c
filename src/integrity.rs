//! Size and digest checks guarding reloaded artifacts.

use sha2::{Digest, Sha256};

use crate::artifact::ArtifactMetadata;
use crate::error::IntegrityViolation;
use crate::types::Sha256Digest;

/// Computes the upper-case hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> Sha256Digest {
    Sha256Digest(hex::encode_upper(Sha256::digest(bytes)))
}

/// Checks `bytes` against the size and digest recorded in `metadata`.
///
/// Size is compared first so a truncated blob is rejected without hashing.
///
/// # Errors
///
/// Returns the first mismatch found.
pub fn verify(bytes: &[u8], metadata: &ArtifactMetadata) -> Result<(), IntegrityViolation> {
    let actual_size = bytes.len() as u64;
    if actual_size != u64::from(metadata.size) {
        return Err(IntegrityViolation::SizeMismatch {
            expected: metadata.size,
            actual: actual_size,
        });
    }

    let actual = sha256_hex(bytes);
    if actual.as_str() != metadata.sha256.as_str() {
        return Err(IntegrityViolation::DigestMismatch {
            expected: metadata.sha256.clone(),
            actual,
        });
    }
    Ok(())
}
