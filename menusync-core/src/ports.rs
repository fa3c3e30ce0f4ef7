//! Port traits abstracting all I/O away from the pipeline.

use chrono::{DateTime, Utc};
use menusync_types::fields::Fields;
use menusync_types::lookups::{BrandRecord, TagRecord};
use std::collections::{BTreeMap, BTreeSet};

/// The external feature-flag backend. Queried exactly once per manifest
/// entry per batch; a failure is batch-fatal.
pub trait FlagBackend: Send + Sync {
    fn enabled(&self, flag: &str, actor: &str) -> anyhow::Result<bool>;
}

/// Bulk reference lookups. The preloader is the only caller; one query per
/// reference kind per batch, and partial results are not permitted.
pub trait ReferenceSource: Send + Sync {
    fn brands_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, BrandRecord>>;

    fn strain_ids_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, i64>>;

    fn tags_by_name(
        &self,
        names: &BTreeSet<String>,
    ) -> anyhow::Result<BTreeMap<String, TagRecord>>;
}

/// Catalog persistence. One scoped call per item; errors surface as
/// `violations["persistence"]` on the item, never as batch failures.
pub trait CatalogStore: Send + Sync {
    fn find_existing(
        &self,
        source_id: &str,
        external_ids: &[String],
    ) -> anyhow::Result<BTreeMap<String, Fields>>;

    fn insert(&self, source_id: &str, external_id: &str, changes: &Fields) -> anyhow::Result<()>;

    /// `silent` selects the hook-bypassing column update path.
    fn update(
        &self,
        source_id: &str,
        external_id: &str,
        changes: &Fields,
        silent: bool,
    ) -> anyhow::Result<()>;

    fn soft_delete(
        &self,
        source_id: &str,
        external_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// The key already holds an object; write-once semantics make this a
    /// success for idempotent re-runs.
    AlreadyExists,
}

/// Write-once artifact storage for replay packs.
pub trait ArtifactStore: Send + Sync {
    fn put_if_absent(&self, key: &str, bytes: &[u8]) -> anyhow::Result<PutOutcome>;
}
