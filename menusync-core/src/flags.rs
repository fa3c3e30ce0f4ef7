//! Flag snapshotting over a closed manifest.

use crate::errors::BatchError;
use crate::ports::FlagBackend;
use menusync_types::flags::FlagSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Evaluates each manifest flag once for `actor` (typically the source id)
/// and freezes the result. Mid-batch backend changes do not affect the
/// running batch.
pub fn snapshot_flags(
    backend: &dyn FlagBackend,
    actor: &str,
    manifest: &BTreeSet<String>,
) -> Result<FlagSnapshot, BatchError> {
    let mut values = BTreeMap::new();
    for flag in manifest {
        let on = backend
            .enabled(flag, actor)
            .map_err(BatchError::Flags)?;
        values.insert(flag.clone(), on);
    }

    let snapshot = FlagSnapshot::new(values);
    debug!(
        actor,
        flags = manifest.len(),
        version = snapshot.version(),
        "froze flag snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::StaticFlagBackend;

    #[test]
    fn snapshots_every_manifest_flag() {
        let backend = StaticFlagBackend::new([("pricing_normalization", true)]);
        let manifest: BTreeSet<String> = ["pricing_normalization".to_string(), "autotag".to_string()]
            .into_iter()
            .collect();

        let snapshot = snapshot_flags(&backend, "treez-sf", &manifest).unwrap();
        assert_eq!(snapshot.enabled("pricing_normalization"), Ok(true));
        // Flags the backend does not know default to off.
        assert_eq!(snapshot.enabled("autotag"), Ok(false));
        assert!(snapshot.enabled("phantom").is_err());
    }

    #[test]
    fn backend_failure_is_batch_fatal() {
        let backend = StaticFlagBackend::failing();
        let manifest: BTreeSet<String> = ["autotag".to_string()].into_iter().collect();
        let err = snapshot_flags(&backend, "treez-sf", &manifest).unwrap_err();
        assert!(matches!(err, BatchError::Flags(_)));
    }
}
