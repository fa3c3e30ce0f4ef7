//! `menusync.pack.v1`: the on-disk shape of a replay pack.
//!
//! The wire struct is schema-exact and tolerant of unknown fields; the
//! loader switches behavior on `pack_version`.

use crate::fields::Fields;
use crate::item::{ChangedKeys, ItemStatus, Violations};
use crate::lookups::LookupMaps;
use crate::pack::{ReplayPack, RuleOrderEntry};
use crate::schema;
use crate::wire::WireError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackV1 {
    pub pack_version: i64,
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

    pub status: String,

    #[serde(default)]
    pub fired_rules: Vec<String>,

    #[serde(default)]
    pub raw_payload_normalized: Fields,

    #[serde(default)]
    pub mapped_payload: Fields,

    #[serde(default)]
    pub changed_keys: Vec<String>,

    #[serde(default)]
    pub changes: Fields,

    #[serde(default)]
    pub violations: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default)]
    pub resolver_snapshot: LookupMaps,

    #[serde(default)]
    pub rules_order: Vec<RuleOrderEntry>,

    #[serde(default)]
    pub flags_snapshot: BTreeMap<String, bool>,
}

impl From<&ReplayPack> for PackV1 {
    fn from(pack: &ReplayPack) -> Self {
        Self {
            pack_version: pack.pack_version,
            produced_at: pack.produced_at,
            env: pack.env.clone(),
            app_version: pack.app_version.clone(),
            git_sha: pack.git_sha.clone(),
            ruleset_version: pack.ruleset_version.clone(),
            flags_version: pack.flags_version.clone(),
            payload_schema_version: pack.payload_schema_version.clone(),
            source_id: pack.source_id.clone(),
            external_id: pack.external_id.clone(),
            ingest_id: pack.ingest_id.clone(),
            status: pack.status.as_str().to_string(),
            fired_rules: pack.fired_rules.clone(),
            raw_payload_normalized: pack.raw_payload_normalized.clone(),
            mapped_payload: pack.mapped_payload.clone(),
            changed_keys: pack.changed_keys.clone().into(),
            changes: pack.changes.clone(),
            violations: pack
                .violations
                .as_ref()
                .map(|v| v.iter().map(|(k, m)| (k.clone(), m.clone())).collect()),
            resolver_snapshot: pack.resolver_snapshot.clone(),
            rules_order: pack.rules_order.clone(),
            flags_snapshot: pack.flags_snapshot.clone(),
        }
    }
}

impl TryFrom<PackV1> for ReplayPack {
    type Error = WireError;

    fn try_from(wire: PackV1) -> Result<Self, Self::Error> {
        if wire.pack_version != schema::PACK_VERSION_V1 {
            return Err(WireError::UnsupportedVersion {
                version: wire.pack_version,
            });
        }

        let status = ItemStatus::parse(&wire.status).ok_or_else(|| WireError::UnknownStatus {
            status: wire.status.clone(),
            external_id: wire.external_id.clone(),
        })?;

        let violations = wire.violations.map(|raw| {
            let mut v = Violations::new();
            for (field, messages) in raw {
                for message in messages {
                    v.add(field.clone(), message);
                }
            }
            v
        });

        Ok(ReplayPack {
            pack_version: wire.pack_version,
            produced_at: wire.produced_at,
            env: wire.env,
            app_version: wire.app_version,
            git_sha: wire.git_sha,
            ruleset_version: wire.ruleset_version,
            flags_version: wire.flags_version,
            payload_schema_version: wire.payload_schema_version,
            source_id: wire.source_id,
            external_id: wire.external_id,
            ingest_id: wire.ingest_id,
            status,
            fired_rules: wire.fired_rules,
            raw_payload_normalized: wire.raw_payload_normalized,
            mapped_payload: wire.mapped_payload,
            changed_keys: ChangedKeys::from(wire.changed_keys),
            changes: wire.changes,
            violations,
            resolver_snapshot: wire.resolver_snapshot,
            rules_order: wire.rules_order,
            flags_snapshot: wire.flags_snapshot,
        })
    }
}
