//! The per-item processor state machine.
//!
//! Stages run strictly in order: raw validation, external transform and
//! action classification, changeset computation, canonical transform,
//! canonical validation, persistence. Every stage consumes the item
//! context and returns a successor; stages 1-6 are pure functions of the
//! payload and the frozen batch context.

use crate::context::{BatchContext, ItemContext};
use crate::diff::semantic_diff;
use crate::ports::CatalogStore;
use menusync_rules::{Contract, EvalContext, EvalError, RuleSet, SchemaContract};
use menusync_types::fields::{self, Fields};
use menusync_types::item::{Action, ChangedKeys, ItemStatus, Violations};
use std::collections::BTreeSet;
use tracing::debug;

/// Soft-delete reason recorded for tombstoned items.
const TOMBSTONE_REASON: &str = "source_tombstone";

/// Everything source-specific: the raw contract, the payload schema
/// version, and the tombstone pointer.
pub struct SourceSpec {
    pub source_id: String,
    pub payload_schema_version: String,
    pub raw_contract: Box<dyn Contract>,
    pub tombstone: Box<dyn Fn(&Fields) -> bool + Send + Sync>,
}

impl SourceSpec {
    /// The Treez source: its raw schema, with `deleted_at` as the
    /// tombstone marker.
    pub fn treez(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            payload_schema_version: "treez.v1".to_string(),
            raw_contract: Box::new(menusync_rules::treez_raw_contract()),
            tombstone: Box::new(|payload| {
                fields::non_blank_str(payload, "deleted_at").is_some()
            }),
        }
    }
}

/// The compiled rulesets one pipeline evaluates: the per-source external
/// transformer plus the canonical create and update rulesets.
pub struct ActionRulesets {
    pub external: RuleSet,
    pub create: RuleSet,
    pub update: RuleSet,
}

pub struct Processor<'a> {
    pub source: &'a SourceSpec,
    pub rulesets: &'a ActionRulesets,
    pub canonical_contract: &'a SchemaContract,
    pub store: &'a dyn CatalogStore,
    pub silent_keys: &'a BTreeSet<String>,
}

impl Processor<'_> {
    /// Runs one item to a terminal status.
    pub fn process(&self, item: ItemContext, batch: &BatchContext) -> ItemContext {
        let item = item.processing();

        // Raw validation.
        let violations = self.source.raw_contract.validate(&item.payload);
        if !violations.is_empty() {
            return item
                .with_fired(vec!["raw_validation".to_string()])
                .rejected(violations);
        }

        // External transform and action classification.
        let tombstoned = (self.source.tombstone)(&item.payload);
        let external = self.rulesets.external.evaluate(EvalContext {
            payload: &item.payload,
            existing: item.existing.as_ref(),
            changed_keys: ChangedKeys::empty(),
            flags: &batch.flags,
            lookups: &batch.lookups,
            now: batch.now,
            tombstoned,
        });
        let external = match external {
            Ok(eval) => eval,
            Err(err) => return reject_on_eval_error(item, err),
        };

        let mut mapped = external.changes;
        let action = mapped
            .remove("action")
            .as_ref()
            .and_then(|v| v.as_str().and_then(Action::parse));
        let item = item.with_fired(external.fired).with_mapped(mapped);

        let action = match action {
            Some(action) => action,
            None => {
                let mut violations = Violations::new();
                violations.add("action", "unclassifiable");
                return item.rejected(violations);
            }
        };
        let item = item.with_action(action);

        // Changeset.
        let changed_keys = match action {
            Action::Create => ChangedKeys::All,
            Action::Destroy => ChangedKeys::empty(),
            Action::Update => {
                let existing = item.existing.as_ref().cloned().unwrap_or_default();
                ChangedKeys::Keys(semantic_diff(&existing, &item.mapped))
            }
        };
        let item = item.with_changed_keys(changed_keys);

        // Canonical transform.
        let item = match action {
            Action::Create | Action::Update => {
                let ruleset = if action == Action::Create {
                    &self.rulesets.create
                } else {
                    &self.rulesets.update
                };
                let eval = ruleset.evaluate(EvalContext {
                    payload: &item.mapped,
                    existing: item.existing.as_ref(),
                    changed_keys: item.changed_keys.clone(),
                    flags: &batch.flags,
                    lookups: &batch.lookups,
                    now: batch.now,
                    tombstoned,
                });
                match eval {
                    Ok(eval) => item.with_fired(eval.fired).with_changes(eval.changes),
                    Err(err) => return reject_on_eval_error(item, err),
                }
            }
            Action::Destroy => item,
        };

        // Canonical validation. Destroys carry no canonical fields and
        // skip it.
        if action != Action::Destroy {
            let projection = self.projection(&item, action);
            let violations = self.canonical_contract.validate(&projection);
            if !violations.is_empty() {
                return item.rejected(violations);
            }
        }

        // Persistence: exactly one scoped store call per item.
        self.persist(item, action, batch)
    }

    /// The field bag canonical validation runs over: the change set
    /// overlaid on the mapped projection, with the existing record
    /// underneath for updates.
    fn projection(&self, item: &ItemContext, action: Action) -> Fields {
        let mut projection = match (action, item.existing.as_ref()) {
            (Action::Update, Some(existing)) => existing.clone(),
            _ => Fields::new(),
        };
        for (key, value) in &item.mapped {
            projection.insert(key.clone(), value.clone());
        }
        for (key, value) in &item.changes {
            projection.insert(key.clone(), value.clone());
        }
        projection
    }

    fn persist(&self, item: ItemContext, action: Action, batch: &BatchContext) -> ItemContext {
        let source_id = self.source.source_id.as_str();
        let external_id = item.external_id.clone();

        let result = match action {
            Action::Create => self
                .store
                .insert(source_id, &external_id, &item.changes)
                .map(|()| ItemStatus::Created),
            Action::Update => {
                if item.changes.is_empty() {
                    debug!(external_id = %external_id, "empty change set, noop");
                    Ok(ItemStatus::Noop)
                } else {
                    let silent = item.changes.keys().all(|k| self.silent_keys.contains(k));
                    self.store
                        .update(source_id, &external_id, &item.changes, silent)
                        .map(|()| ItemStatus::Updated)
                }
            }
            Action::Destroy => self
                .store
                .soft_delete(source_id, &external_id, TOMBSTONE_REASON, batch.now)
                .map(|()| ItemStatus::Destroyed),
        };

        match result {
            Ok(status) => item.finished(status),
            Err(err) => {
                let mut violations = Violations::new();
                violations.add("persistence", format!("{err:#}"));
                item.rejected(violations)
            }
        }
    }
}

fn reject_on_eval_error(item: ItemContext, err: EvalError) -> ItemContext {
    let mut violations = Violations::new();
    if err.is_conflict() {
        violations.add("rule_conflict", err.to_string());
    } else {
        violations.add(format!("rule_error.{}", err.rule()), err.to_string());
    }
    item.rejected(violations)
}
