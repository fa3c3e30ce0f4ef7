//! Compiler behavior: conflict detection, cycle rejection, deterministic
//! ordering, and evaluation merge policies.

use chrono::Utc;
use menusync_rules::{compile, CompileError, CompileOptions, EvalContext, Rule, RuleError};
use menusync_types::fields::{Fields, Patch};
use menusync_types::flags::FlagSnapshot;
use menusync_types::item::ChangedKeys;
use menusync_types::lookups::LookupMaps;
use menusync_types::meta::{MergePolicy, RuleMeta};
use serde_json::json;
use std::sync::Arc;

struct StubRule {
    meta: RuleMeta,
    patch: Patch,
}

impl Rule for StubRule {
    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn applies(&self, _ctx: &EvalContext<'_>) -> bool {
        true
    }

    fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
        Ok(self.patch.clone())
    }
}

fn stub(meta: RuleMeta) -> Arc<dyn Rule> {
    let patch = meta
        .writes
        .iter()
        .map(|k| (k.clone(), json!(format!("from_{}", meta.name))))
        .collect();
    Arc::new(StubRule { meta, patch })
}

struct Fixture {
    payload: Fields,
    flags: FlagSnapshot,
    lookups: LookupMaps,
}

impl Fixture {
    fn new() -> Self {
        Self {
            payload: Fields::new(),
            flags: FlagSnapshot::empty(),
            lookups: LookupMaps::default(),
        }
    }

    fn ctx(&self) -> EvalContext<'_> {
        EvalContext {
            payload: &self.payload,
            existing: None,
            changed_keys: ChangedKeys::empty(),
            flags: &self.flags,
            lookups: &self.lookups,
            now: Utc::now(),
            tombstoned: false,
        }
    }
}

#[test]
fn shared_writes_without_ordering_fail_compilation() {
    let rules = vec![
        stub(RuleMeta::new("a").writes(["tags"])),
        stub(RuleMeta::new("b").writes(["tags"])),
    ];
    let err = compile(
        rules,
        "v1",
        CompileOptions::with_policy(MergePolicy::ErrorOnConflict),
    )
    .unwrap_err();
    match err {
        CompileError::WriteConflicts { pairs } => {
            assert_eq!(pairs.len(), 1);
            assert_eq!(pairs[0].left, "a");
            assert_eq!(pairs[0].right, "b");
            assert_eq!(pairs[0].keys, vec!["tags"]);
        }
        other => panic!("expected WriteConflicts, got {other}"),
    }
}

#[test]
fn shared_writes_with_an_ordering_edge_compile() {
    let rules = vec![
        stub(RuleMeta::new("a").writes(["tags"])),
        stub(RuleMeta::new("b").writes(["tags"]).after(["a"])),
    ];
    let ruleset = compile(
        rules,
        "v1",
        CompileOptions::with_policy(MergePolicy::ErrorOnConflict),
    )
    .unwrap();
    assert_eq!(ruleset.ordered(), ["a", "b"]);
}

#[test]
fn transitive_ordering_counts_as_ordered() {
    let rules = vec![
        stub(RuleMeta::new("a").writes(["tags"])),
        stub(RuleMeta::new("mid").after(["a"])),
        stub(RuleMeta::new("b").writes(["tags"]).after(["mid"])),
    ];
    assert!(compile(
        rules,
        "v1",
        CompileOptions::with_policy(MergePolicy::ErrorOnConflict),
    )
    .is_ok());
}

#[test]
fn cycles_are_rejected_with_members() {
    let rules = vec![
        stub(RuleMeta::new("a").before(["b"])),
        stub(RuleMeta::new("b").before(["c"])),
        stub(RuleMeta::new("c").before(["a"])),
    ];
    let err = compile(rules, "v1", CompileOptions::default()).unwrap_err();
    match err {
        CompileError::Cycle { members } => {
            assert_eq!(members, vec!["a", "b", "c"]);
        }
        other => panic!("expected Cycle, got {other}"),
    }
}

#[test]
fn phantom_ordering_target_is_rejected() {
    let rules = vec![stub(RuleMeta::new("a").before(["ghost"]))];
    let err = compile(rules, "v1", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::UnknownOrderingTarget { .. }));
}

#[test]
fn duplicate_names_are_rejected() {
    let rules = vec![stub(RuleMeta::new("a")), stub(RuleMeta::new("a"))];
    let err = compile(rules, "v1", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::DuplicateName { .. }));
}

#[test]
fn flags_outside_the_manifest_are_rejected() {
    let rules = vec![stub(RuleMeta::new("a").flags(["phantom_flag"]))];
    let err = compile(rules, "v1", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::UndeclaredFlag { .. }));

    let rules = vec![stub(RuleMeta::new("a").flags(["known_flag"]))];
    assert!(compile(
        rules,
        "v1",
        CompileOptions::default().flag_manifest(["known_flag"]),
    )
    .is_ok());
}

#[test]
fn ready_nodes_order_by_priority_then_name() {
    let rules = vec![
        stub(RuleMeta::new("zeta").priority(1)),
        stub(RuleMeta::new("alpha").priority(5)),
        stub(RuleMeta::new("mid").priority(1)),
    ];
    let ruleset = compile(rules, "v1", CompileOptions::default()).unwrap();
    assert_eq!(ruleset.ordered(), ["mid", "zeta", "alpha"]);
}

#[test]
fn explicit_edges_override_priority() {
    let rules = vec![
        stub(RuleMeta::new("late").priority(0).after(["early"])),
        stub(RuleMeta::new("early").priority(100)),
    ];
    let ruleset = compile(rules, "v1", CompileOptions::default()).unwrap();
    assert_eq!(ruleset.ordered(), ["early", "late"]);
}

#[test]
fn data_flow_edges_order_writer_before_reader() {
    let rules = vec![
        stub(RuleMeta::new("reader").priority(0).reads(["brand_id"])),
        stub(
            RuleMeta::new("writer")
                .priority(10)
                .reads(["brand_name"])
                .writes(["brand_id"]),
        ),
    ];
    let mut options = CompileOptions::default();
    options.synthesize_data_edges = true;
    let ruleset = compile(rules, "v1", options).unwrap();
    assert_eq!(ruleset.ordered(), ["writer", "reader"]);
}

#[test]
fn data_flow_edges_relax_the_conflict_check() {
    let rules = vec![
        stub(RuleMeta::new("a").writes(["tags"])),
        stub(RuleMeta::new("b").writes(["tags"])),
    ];
    let mut options = CompileOptions::with_policy(MergePolicy::ErrorOnConflict);
    options.synthesize_data_edges = true;
    assert!(compile(rules, "v1", options).is_ok());
}

#[test]
fn last_wins_lets_later_rules_override() {
    let f = Fixture::new();
    let rules = vec![
        stub(RuleMeta::new("first").writes(["status"])),
        stub(RuleMeta::new("second").writes(["status"]).after(["first"])),
    ];
    let ruleset = compile(rules, "v1", CompileOptions::default()).unwrap();
    let eval = ruleset.evaluate(f.ctx()).unwrap();
    assert_eq!(eval.changes.get("status"), Some(&json!("from_second")));
    assert_eq!(eval.fired, ["first", "second"]);
}

#[test]
fn first_wins_keeps_the_earliest_write() {
    let f = Fixture::new();
    let rules = vec![
        stub(RuleMeta::new("first").writes(["status"])),
        stub(RuleMeta::new("second").writes(["status"]).after(["first"])),
    ];
    let ruleset = compile(
        rules,
        "v1",
        CompileOptions::with_policy(MergePolicy::FirstWins),
    )
    .unwrap();
    let eval = ruleset.evaluate(f.ctx()).unwrap();
    assert_eq!(eval.changes.get("status"), Some(&json!("from_first")));
}

#[test]
fn runtime_double_write_fails_under_error_on_conflict() {
    let f = Fixture::new();
    let rules = vec![
        stub(RuleMeta::new("first").writes(["status"])),
        stub(RuleMeta::new("second").writes(["status"]).after(["first"])),
    ];
    let ruleset = compile(
        rules,
        "v1",
        CompileOptions::with_policy(MergePolicy::ErrorOnConflict),
    )
    .unwrap();
    let err = ruleset.evaluate(f.ctx()).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.rule(), "second");
}

#[test]
fn undeclared_writes_fail_evaluation() {
    struct Rogue {
        meta: RuleMeta,
    }
    impl Rule for Rogue {
        fn meta(&self) -> &RuleMeta {
            &self.meta
        }
        fn applies(&self, _ctx: &EvalContext<'_>) -> bool {
            true
        }
        fn apply(&self, _ctx: &EvalContext<'_>) -> Result<Patch, RuleError> {
            let mut patch = Patch::new();
            patch.insert("sneaky".to_string(), json!(true));
            Ok(patch)
        }
    }

    let f = Fixture::new();
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(Rogue {
        meta: RuleMeta::new("rogue").writes(["status"]),
    })];
    let ruleset = compile(rules, "v1", CompileOptions::default()).unwrap();
    let err = ruleset.evaluate(f.ctx()).unwrap_err();
    assert!(matches!(
        err,
        menusync_rules::EvalError::UndeclaredWrites { .. }
    ));
}

#[test]
fn evaluation_extends_the_running_changed_keys() {
    let f = Fixture::new();
    let rules = vec![stub(RuleMeta::new("writer").writes(["brand_id"]))];
    let ruleset = compile(rules, "v1", CompileOptions::default()).unwrap();
    let eval = ruleset.evaluate(f.ctx()).unwrap();
    assert!(eval.changed_keys.contains("brand_id"));
    assert!(!eval.changed_keys.contains("strain_id"));
}

#[test]
fn equal_inputs_yield_identical_evaluations() {
    let f = Fixture::new();
    let build = || {
        compile(
            vec![
                stub(RuleMeta::new("b").writes(["x"])),
                stub(RuleMeta::new("a").writes(["y"])),
                stub(RuleMeta::new("c").writes(["z"]).after(["a"])),
            ],
            "v1",
            CompileOptions::default(),
        )
        .unwrap()
    };
    let first = build().evaluate(f.ctx()).unwrap();
    let second = build().evaluate(f.ctx()).unwrap();
    assert_eq!(first, second);
}
