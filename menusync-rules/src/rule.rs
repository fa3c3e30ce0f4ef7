//! The rule contract: declarative metadata plus a pure applies/apply pair.

use chrono::{DateTime, Utc};
use menusync_types::fields::{self, Fields, Patch};
use menusync_types::flags::FlagSnapshot;
use menusync_types::item::ChangedKeys;
use menusync_types::lookups::LookupMaps;
use menusync_types::meta::RuleMeta;
use thiserror::Error;

/// A rule body failure. Fatal for the item being processed; the processor
/// records it under `violations["rule_error.<name>"]`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuleError {
    pub message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything a rule may observe. Built by the evaluator per item; rules
/// never see clocks, flags backends, or reference stores directly.
///
/// `changed_keys` is the running set: the evaluator extends it with each
/// fired rule's declared writes before the next rule runs.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    /// The projection this ruleset reads: the normalized raw payload for
    /// external transformers, the mapped canonical payload for
    /// create/update rulesets.
    pub payload: &'a Fields,

    /// The existing catalog record, when one matched the external id.
    pub existing: Option<&'a Fields>,

    pub changed_keys: ChangedKeys,
    pub flags: &'a FlagSnapshot,
    pub lookups: &'a LookupMaps,
    pub now: DateTime<Utc>,

    /// True when the source's tombstone pointer matched the payload.
    pub tombstoned: bool,
}

impl<'a> EvalContext<'a> {
    pub fn payload_str(&self, key: &str) -> Option<&'a str> {
        fields::non_blank_str(self.payload, key)
    }

    pub fn payload_int(&self, key: &str) -> Option<i64> {
        fields::int_of(self.payload, key)
    }

    pub fn payload_list(&self, key: &str) -> Vec<String> {
        fields::str_list(self.payload, key)
    }

    /// True when `key` changed versus the existing record. Creates carry
    /// the `All` sentinel, so every key reads as changed.
    pub fn changed(&self, key: &str) -> bool {
        self.changed_keys.contains(key)
    }

    /// Flag lookup for `applies` predicates. Names outside the snapshot
    /// read as off; compilation already rejects rules declaring flags
    /// outside the batch manifest.
    pub fn flag_on(&self, name: &str) -> bool {
        self.flags.enabled(name).unwrap_or(false)
    }
}

/// A rule: metadata plus two pure functions over the context.
///
/// `apply` must emit keys only from `meta().writes`; an empty patch is
/// legal and signals "no change". No I/O, no clock or RNG access, no
/// mutation of the context.
pub trait Rule: Send + Sync {
    fn meta(&self) -> &RuleMeta;

    fn applies(&self, ctx: &EvalContext<'_>) -> bool;

    fn apply(&self, ctx: &EvalContext<'_>) -> Result<Patch, RuleError>;
}

impl std::fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Rule")
            .field("name", &self.meta().name)
            .finish_non_exhaustive()
    }
}
