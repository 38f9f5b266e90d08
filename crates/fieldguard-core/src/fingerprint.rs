use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex-encoded SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Fingerprint of a value's canonical JSON encoding.
///
/// Struct fields serialize in declaration order and every map in the model is
/// a `BTreeMap`, so equal values always produce equal fingerprints.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_hex(&bytes))
}

/// Incremental fingerprint over several byte slices.
#[derive(Default, Clone)]
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl std::fmt::Debug for FingerprintBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintBuilder").finish_non_exhaustive()
    }
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one field; fields are length-prefixed so concatenations stay distinct.
    pub fn field(mut self, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_separates_fields() {
        let left = FingerprintBuilder::new().field("ab").field("c").finish();
        let right = FingerprintBuilder::new().field("a").field("bc").finish();
        assert_ne!(left, right);
    }

    #[test]
    fn fingerprint_is_stable() {
        let first = fingerprint(&vec!["x", "y"]).unwrap();
        let second = fingerprint(&vec!["x", "y"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }
}
