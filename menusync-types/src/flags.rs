//! Frozen feature-flag snapshots with a stable version digest.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Number of hex characters kept from the SHA-256 digest for fingerprints.
const FINGERPRINT_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("flag `{name}` is not in the batch snapshot")]
pub struct UnknownFlagError {
    pub name: String,
}

/// Frozen `{flag -> bool}` map resolved once per batch, plus a stable
/// 12-hex-char digest over the sorted map. Mid-batch backend changes never
/// affect a running batch; this snapshot is the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSnapshot {
    values: BTreeMap<String, bool>,
    version: String,
}

impl FlagSnapshot {
    pub fn new(values: BTreeMap<String, bool>) -> Self {
        let version = flags_fingerprint(&values);
        Self { values, version }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    /// Errors on names outside the snapshot; the manifest is closed.
    pub fn enabled(&self, name: &str) -> Result<bool, UnknownFlagError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| UnknownFlagError {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn values(&self) -> &BTreeMap<String, bool> {
        &self.values
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// First 12 hex chars of SHA-256 over the canonical JSON of the sorted map.
pub fn flags_fingerprint(values: &BTreeMap<String, bool>) -> String {
    // BTreeMap serializes in sorted key order, which is the canonical form.
    let canonical = serde_json::to_string(values).unwrap_or_default();
    fingerprint(canonical.as_bytes())
}

/// Truncated SHA-256 hex digest used for flag and ruleset versioning.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}
