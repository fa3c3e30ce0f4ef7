//! Internal model of the per-item replay pack.
//!
//! A pack is self-contained: it carries every input a runner needs to
//! re-execute the item's transformation without live services. The wire
//! representation lives in [`crate::wire::pack_v1`].

use crate::fields::Fields;
use crate::item::{ChangedKeys, ItemStatus, Violations};
use crate::lookups::LookupMaps;
use crate::schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the compiled rule order captured at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOrderEntry {
    pub name: String,
    pub priority: i32,
}

/// Immutable per-item replay artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayPack {
    pub pack_version: i64,

    /// Unix seconds.
    pub produced_at: i64,

    pub env: String,
    pub app_version: String,
    pub git_sha: String,
    pub ruleset_version: String,
    pub flags_version: String,
    pub payload_schema_version: String,

    pub source_id: String,
    pub external_id: String,
    pub ingest_id: String,

    pub status: ItemStatus,
    pub fired_rules: Vec<String>,

    pub raw_payload_normalized: Fields,
    pub mapped_payload: Fields,
    pub changed_keys: ChangedKeys,
    pub changes: Fields,
    pub violations: Option<Violations>,

    /// The lookup slices consulted by this item.
    pub resolver_snapshot: LookupMaps,

    /// The full compiled order the item was evaluated under.
    pub rules_order: Vec<RuleOrderEntry>,

    pub flags_snapshot: BTreeMap<String, bool>,
}

impl ReplayPack {
    /// Object-store key for this pack. Content encoding is the store
    /// adapter's concern; the key carries no extension suffix beyond
    /// `.json`.
    pub fn storage_key(&self) -> String {
        let date = chrono::DateTime::from_timestamp(self.produced_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "env={}/date={}/status={}/ruleset={}/{}/{}/{}.json",
            self.env,
            date,
            self.status.as_str(),
            self.ruleset_version,
            self.source_id,
            self.external_id,
            self.ingest_id,
        )
    }

    pub fn is_current_version(&self) -> bool {
        self.pack_version == schema::PACK_VERSION_V1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack() -> ReplayPack {
        ReplayPack {
            pack_version: schema::PACK_VERSION_V1,
            produced_at: 1_735_689_600, // 2025-01-01T00:00:00Z
            env: "production".to_string(),
            app_version: "0.3.0".to_string(),
            git_sha: "abc123".to_string(),
            ruleset_version: "9f8e7d6c5b4a".to_string(),
            flags_version: "112233445566".to_string(),
            payload_schema_version: "treez.v1".to_string(),
            source_id: "treez-sf".to_string(),
            external_id: "X1".to_string(),
            ingest_id: "ing-1".to_string(),
            status: ItemStatus::Created,
            fired_rules: vec!["field_map".to_string()],
            raw_payload_normalized: Fields::new(),
            mapped_payload: Fields::new(),
            changed_keys: ChangedKeys::All,
            changes: Fields::new(),
            violations: None,
            resolver_snapshot: LookupMaps::default(),
            rules_order: vec![RuleOrderEntry {
                name: "field_map".to_string(),
                priority: 0,
            }],
            flags_snapshot: BTreeMap::new(),
        }
    }

    #[test]
    fn storage_key_layout() {
        let key = pack().storage_key();
        assert_eq!(
            key,
            "env=production/date=2025-01-01/status=created/ruleset=9f8e7d6c5b4a/treez-sf/X1/ing-1.json"
        );
    }
}
