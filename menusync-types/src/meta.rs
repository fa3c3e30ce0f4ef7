//! Declarative rule metadata and merge policies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a ruleset merges a rule's patch into the accumulated changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The newest patch overrides earlier writes to the same key.
    #[default]
    LastWins,
    /// Earlier writes win; later patches only fill untouched keys.
    FirstWins,
    /// A second writer to an already-written key fails the item.
    ErrorOnConflict,
}

/// Declarative descriptor of a rule.
///
/// `writes` is the authoritative set of keys the rule may emit; the
/// evaluator rejects patches outside it. `before`/`after` express explicit
/// ordering by rule name and must reference rules present in the same
/// ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMeta {
    pub name: String,

    /// Lower runs earlier among tie-broken ready nodes.
    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub reads: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub writes: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub before: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub after: BTreeSet<String>,

    /// Feature flags the rule consults. Must lie inside the batch flag
    /// manifest; checked at compile time.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<String>,
}

impl RuleMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            before: BTreeSet::new(),
            after: BTreeSet::new(),
            flags: BTreeSet::new(),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn reads<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn writes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn before<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn flags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(names.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_sets() {
        let meta = RuleMeta::new("brand_name_rule")
            .priority(10)
            .reads(["brand_name"])
            .writes(["brand_id"])
            .after(["field_map"]);
        assert_eq!(meta.name, "brand_name_rule");
        assert_eq!(meta.priority, 10);
        assert!(meta.reads.contains("brand_name"));
        assert!(meta.writes.contains("brand_id"));
        assert!(meta.after.contains("field_map"));
        assert!(meta.flags.is_empty());
    }

    #[test]
    fn merge_policy_serializes_snake_case() {
        let json = serde_json::to_string(&MergePolicy::ErrorOnConflict).unwrap();
        assert_eq!(json, "\"error_on_conflict\"");
    }
}
