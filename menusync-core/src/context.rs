//! Frozen per-batch and per-item context carriers.

use chrono::{DateTime, Utc};
use menusync_types::fields::Fields;
use menusync_types::flags::FlagSnapshot;
use menusync_types::item::{Action, ChangedKeys, ItemStatus, OutcomeRecord, Violations};
use menusync_types::lookups::LookupMaps;

/// Constructed exactly once per batch invocation; deep-immutable after
/// construction. Every item in the batch observes identical values, and
/// the struct is safe for concurrent read.
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Sampled once at batch start; rules never read a clock.
    pub now: DateTime<Utc>,

    pub env: String,
    pub source_id: String,
    pub ingest_id: String,

    pub flags: FlagSnapshot,
    pub lookups: LookupMaps,
    pub ruleset_version: String,
}

/// The per-item carrier threaded through the processor stages. Each stage
/// consumes its input and returns a successor; the original is never
/// mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContext {
    /// Stable input index; outcome ordering tracks it.
    pub index: usize,

    pub external_id: String,

    /// Normalized raw payload as received.
    pub payload: Fields,

    /// Canonical projection produced by the external transformer.
    pub mapped: Fields,

    pub existing: Option<Fields>,
    pub changed_keys: ChangedKeys,
    pub action: Option<Action>,
    pub status: ItemStatus,
    pub fired: Vec<String>,
    pub violations: Violations,
    pub changes: Fields,
}

impl ItemContext {
    pub fn queued(
        index: usize,
        external_id: impl Into<String>,
        payload: Fields,
        existing: Option<Fields>,
    ) -> Self {
        Self {
            index,
            external_id: external_id.into(),
            payload,
            mapped: Fields::new(),
            existing,
            changed_keys: ChangedKeys::empty(),
            action: None,
            status: ItemStatus::Queued,
            fired: Vec::new(),
            violations: Violations::new(),
            changes: Fields::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    pub fn processing(mut self) -> Self {
        self.status = ItemStatus::Processing;
        self
    }

    pub fn with_mapped(mut self, mapped: Fields) -> Self {
        self.mapped = mapped;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_changed_keys(mut self, changed_keys: ChangedKeys) -> Self {
        self.changed_keys = changed_keys;
        self
    }

    pub fn with_changes(mut self, changes: Fields) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_fired(mut self, fired: Vec<String>) -> Self {
        self.fired.extend(fired);
        self
    }

    pub fn rejected(mut self, violations: Violations) -> Self {
        self.violations.merge(violations);
        self.status = ItemStatus::Rejected;
        self
    }

    pub fn finished(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn outcome(&self) -> OutcomeRecord {
        OutcomeRecord {
            external_id: self.external_id.clone(),
            status: self.status,
            fired_rules: self.fired.clone(),
            violations: self.violations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn successors_carry_prior_state_forward() {
        let mut payload = Fields::new();
        payload.insert("external_id".to_string(), json!("X1"));

        let item = ItemContext::queued(0, "X1", payload, None)
            .processing()
            .with_fired(vec!["field_map".to_string()])
            .with_action(Action::Create)
            .finished(ItemStatus::Created);

        assert_eq!(item.status, ItemStatus::Created);
        assert_eq!(item.action, Some(Action::Create));
        assert_eq!(item.fired, vec!["field_map"]);
        assert!(item.is_valid());
    }

    #[test]
    fn rejection_merges_violations_and_terminates() {
        let mut violations = Violations::new();
        violations.add("name", "must be filled");

        let item = ItemContext::queued(0, "X4", Fields::new(), None)
            .processing()
            .with_fired(vec!["raw_validation".to_string()])
            .rejected(violations);

        assert_eq!(item.status, ItemStatus::Rejected);
        assert!(item.is_invalid());
        assert_eq!(item.outcome().fired_rules, vec!["raw_validation"]);
    }
}
