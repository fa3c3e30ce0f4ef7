//! Rule-by-rule re-execution of a recorded item.

use menusync_rules::{EvalContext, RuleSet};
use menusync_types::fields::Fields;
use menusync_types::flags::FlagSnapshot;
use menusync_types::item::{ChangedKeys, ItemStatus};
use menusync_types::pack::ReplayPack;

/// One re-executed rule from the recorded order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub rule: String,
    pub applied: bool,
    pub patch: Fields,

    /// Keys the patch wrote over values already present in the running
    /// state.
    pub conflicts: Vec<String>,

    /// The running state after merging this step.
    pub state_after: Fields,
}

/// The full replay of one pack.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    pub fired: Vec<String>,
    pub mapped: Fields,
    pub changes: Fields,
    pub divergences: Vec<String>,
}

impl ReplayReport {
    pub fn is_faithful(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Re-executes packs against the same compiled rulesets the pipeline ran.
/// All inputs come from the pack; no live service is consulted.
pub struct Replayer<'a> {
    pub external: &'a RuleSet,
    pub create: &'a RuleSet,
    pub update: &'a RuleSet,
}

impl Replayer<'_> {
    pub fn replay(&self, pack: &ReplayPack) -> ReplayReport {
        // Raw-validation rejects never reached the rule engine; there is
        // nothing to re-execute.
        if pack.fired_rules == ["raw_validation"] {
            return ReplayReport {
                steps: Vec::new(),
                fired: pack.fired_rules.clone(),
                mapped: Fields::new(),
                changes: Fields::new(),
                divergences: Vec::new(),
            };
        }

        let flags = FlagSnapshot::new(pack.flags_snapshot.clone());
        let lookups = pack.resolver_snapshot.clone();
        let now = chrono::DateTime::from_timestamp(pack.produced_at, 0)
            .unwrap_or_else(chrono::Utc::now);

        let (has_existing, tombstoned) = presence_from_pack(pack);
        // Rules only test for record presence; the content is never read.
        let existing_marker = Fields::new();
        let existing = if has_existing {
            Some(&existing_marker)
        } else {
            None
        };

        let canonical = self.canonical_for(pack);

        let mut steps: Vec<ReplayStep> = Vec::new();
        let mut fired: Vec<String> = Vec::new();
        let mut divergences: Vec<String> = Vec::new();
        let mut mapped_run = Fields::new();
        let mut changes_run = Fields::new();

        for entry in &pack.rules_order {
            let (rule, payload, changed_keys, state) =
                if let Some(rule) = self.external.rule(&entry.name) {
                    (
                        rule,
                        &pack.raw_payload_normalized,
                        ChangedKeys::empty(),
                        &mut mapped_run,
                    )
                } else if let Some(rule) = canonical.and_then(|set| set.rule(&entry.name)) {
                    (
                        rule,
                        &pack.mapped_payload,
                        pack.changed_keys.clone(),
                        &mut changes_run,
                    )
                } else {
                    divergences.push(format!(
                        "rule `{}` is not present in the provided rulesets",
                        entry.name
                    ));
                    continue;
                };

            let ctx = EvalContext {
                payload,
                existing,
                changed_keys,
                flags: &flags,
                lookups: &lookups,
                now,
                tombstoned,
            };

            let applied = rule.applies(&ctx);
            let patch = if applied {
                match rule.apply(&ctx) {
                    Ok(patch) => patch,
                    Err(err) => {
                        divergences.push(format!("rule `{}` failed during replay: {err}", entry.name));
                        Fields::new()
                    }
                }
            } else {
                Fields::new()
            };

            let conflicts: Vec<String> = patch
                .keys()
                .filter(|k| state.contains_key(*k))
                .cloned()
                .collect();
            for (key, value) in &patch {
                state.insert(key.clone(), value.clone());
            }
            if applied {
                fired.push(entry.name.clone());
            }
            let state_after = state.clone();
            steps.push(ReplayStep {
                rule: entry.name.clone(),
                applied,
                patch,
                conflicts,
                state_after,
            });
        }

        mapped_run.remove("action");

        // Comparisons only make sense for clean terminals; a rejected item
        // stopped mid-stage and recorded a prefix of the work.
        if pack.violations.is_none() {
            if fired != pack.fired_rules {
                divergences.push(format!(
                    "fired rules diverge: recorded {:?}, replayed {:?}",
                    pack.fired_rules, fired
                ));
            }
            if mapped_run != pack.mapped_payload {
                divergences.push("mapped payload diverges from the recorded projection".to_string());
            }
            if changes_run != pack.changes {
                divergences.push(format!(
                    "changes diverge: recorded {:?}, replayed {:?}",
                    pack.changes, changes_run
                ));
            }
        }

        ReplayReport {
            steps,
            fired,
            mapped: mapped_run,
            changes: changes_run,
            divergences,
        }
    }

    fn canonical_for(&self, pack: &ReplayPack) -> Option<&RuleSet> {
        match pack.status {
            ItemStatus::Created => Some(self.create),
            ItemStatus::Updated | ItemStatus::Noop => Some(self.update),
            ItemStatus::Destroyed => None,
            ItemStatus::Rejected | ItemStatus::Queued | ItemStatus::Processing => {
                match &pack.changed_keys {
                    ChangedKeys::All => Some(self.create),
                    ChangedKeys::Keys(keys) if !keys.is_empty() => Some(self.update),
                    ChangedKeys::Keys(_) => None,
                }
            }
        }
    }
}

/// Existing-record presence and tombstone state, recovered from the
/// recorded terminal status.
fn presence_from_pack(pack: &ReplayPack) -> (bool, bool) {
    match pack.status {
        ItemStatus::Created => (false, false),
        ItemStatus::Updated | ItemStatus::Noop => (true, false),
        ItemStatus::Destroyed => (true, true),
        ItemStatus::Rejected | ItemStatus::Queued | ItemStatus::Processing => {
            if pack
                .fired_rules
                .iter()
                .any(|name| name == "destroy_action_rule")
            {
                (true, true)
            } else {
                match &pack.changed_keys {
                    ChangedKeys::All => (false, false),
                    _ => (true, false),
                }
            }
        }
    }
}
