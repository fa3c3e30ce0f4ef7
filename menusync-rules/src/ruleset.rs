//! The frozen, topologically ordered ruleset and its evaluator.

use crate::rule::{EvalContext, Rule};
use menusync_types::fields::Fields;
use menusync_types::item::ChangedKeys;
use menusync_types::meta::MergePolicy;
use menusync_types::pack::RuleOrderEntry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// A compiled, frozen bundle: ordered rule names, rules-by-name, the edge
/// graph, the merge policy, and a version string. Built by
/// [`crate::compile::compile`]; never mutated afterwards.
pub struct RuleSet {
    version: String,
    policy: MergePolicy,
    ordered: Vec<String>,
    rules: BTreeMap<String, Arc<dyn Rule>>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

/// The frozen result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub changes: Fields,
    pub fired: Vec<String>,

    /// The input changed-key set extended with every fired rule's writes.
    pub changed_keys: ChangedKeys,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("rule `{rule}` failed: {message}")]
    RuleFailed { rule: String, message: String },

    #[error("rule `{rule}` wrote undeclared keys {keys:?}")]
    UndeclaredWrites { rule: String, keys: Vec<String> },

    #[error("rule `{rule}` conflicts on already-written keys {keys:?}")]
    WriteConflict { rule: String, keys: Vec<String> },
}

impl EvalError {
    /// The rule the failure is attributed to.
    pub fn rule(&self) -> &str {
        match self {
            EvalError::RuleFailed { rule, .. }
            | EvalError::UndeclaredWrites { rule, .. }
            | EvalError::WriteConflict { rule, .. } => rule,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EvalError::WriteConflict { .. })
    }
}

impl RuleSet {
    pub(crate) fn freeze(
        version: String,
        policy: MergePolicy,
        ordered: Vec<String>,
        rules: BTreeMap<String, Arc<dyn Rule>>,
        edges: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        Self {
            version,
            policy,
            ordered,
            rules,
            edges,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn ordered(&self) -> &[String] {
        &self.ordered
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(name)
    }

    pub fn edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// The compiled order as captured for replay packs.
    pub fn order_entries(&self) -> Vec<RuleOrderEntry> {
        self.ordered
            .iter()
            .filter_map(|name| self.rules.get(name))
            .map(|rule| RuleOrderEntry {
                name: rule.meta().name.clone(),
                priority: rule.meta().priority,
            })
            .collect()
    }

    /// Walks the frozen order over `ctx`. Equal inputs yield identical
    /// `(changes, fired)` including element order.
    pub fn evaluate(&self, mut ctx: EvalContext<'_>) -> Result<Evaluation, EvalError> {
        let mut changes = Fields::new();
        let mut fired: Vec<String> = Vec::new();

        for name in &self.ordered {
            let rule = match self.rules.get(name) {
                Some(rule) => rule,
                None => continue,
            };
            if !rule.applies(&ctx) {
                continue;
            }

            let patch = rule.apply(&ctx).map_err(|e| EvalError::RuleFailed {
                rule: name.clone(),
                message: e.message,
            })?;

            let meta = rule.meta();
            let undeclared: Vec<String> = patch
                .keys()
                .filter(|k| !meta.writes.contains(*k))
                .cloned()
                .collect();
            if !undeclared.is_empty() {
                return Err(EvalError::UndeclaredWrites {
                    rule: name.clone(),
                    keys: undeclared,
                });
            }

            if self.policy == MergePolicy::ErrorOnConflict {
                let overlap: Vec<String> = meta
                    .writes
                    .iter()
                    .filter(|k| changes.contains_key(*k))
                    .cloned()
                    .collect();
                if !overlap.is_empty() {
                    return Err(EvalError::WriteConflict {
                        rule: name.clone(),
                        keys: overlap,
                    });
                }
            }

            match self.policy {
                MergePolicy::LastWins | MergePolicy::ErrorOnConflict => {
                    for (key, value) in patch {
                        changes.insert(key, value);
                    }
                }
                MergePolicy::FirstWins => {
                    for (key, value) in patch {
                        changes.entry(key).or_insert(value);
                    }
                }
            }

            fired.push(name.clone());
            ctx.changed_keys.extend(meta.writes.iter().cloned());
        }

        Ok(Evaluation {
            changes,
            fired,
            changed_keys: ctx.changed_keys,
        })
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("version", &self.version)
            .field("policy", &self.policy)
            .field("ordered", &self.ordered)
            .finish()
    }
}
